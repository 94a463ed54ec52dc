// Uzbek phone number normalisation

use thiserror::Error;

const COUNTRY_CODE: &str = "998";
const LOCAL_LEN: usize = 9;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number must be 9 digits or 12 digits starting with 998")]
    InvalidFormat,
}

/// Reduce a phone number to its 9-digit local form.
///
/// Formatting characters (spaces, dashes, parentheses, a leading `+`) are ignored.
/// A 12-digit number with the `998` country code keeps its last 9 digits.
/// Applying it to its own output returns the same value.
pub fn normalize_phone(raw: &str) -> Result<String, PhoneError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        LOCAL_LEN => Ok(digits),
        n if n == COUNTRY_CODE.len() + LOCAL_LEN && digits.starts_with(COUNTRY_CODE) => {
            Ok(digits[COUNTRY_CODE.len()..].to_string())
        },
        _ => Err(PhoneError::InvalidFormat),
    }
}

/// International form used by the SMS gateway
pub fn to_international(local: &str) -> String {
    format!("{}{}", COUNTRY_CODE, local)
}

/// Mask all but the last four digits for logs
pub fn mask_phone(phone: &str) -> String {
    if phone.len() <= 4 {
        return "****".to_string();
    }
    let visible = &phone[phone.len() - 4..];
    format!("{}{}", "*".repeat(phone.len() - 4), visible)
}
