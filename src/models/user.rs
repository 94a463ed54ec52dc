// User Database Model

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::schema::users;

/// Role of a user account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Client,
    Merchant,
    Admin,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Client => "client",
            UserType::Merchant => "merchant",
            UserType::Admin => "admin",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "client" => Ok(UserType::Client),
            "merchant" => Ok(UserType::Merchant),
            "admin" => Ok(UserType::Admin),
            _ => Err(format!("Invalid user type: {}", s)),
        }
    }
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Phone number already registered")]
    PhoneTaken,

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub phone_number: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub user_type: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub phone_number: String,
    pub name: String,
    pub user_type: String,
    pub is_active: bool,
}

impl User {
    pub fn role(&self) -> Option<UserType> {
        UserType::from_string(&self.user_type).ok()
    }

    pub fn is_merchant(&self) -> bool {
        self.role() == Some(UserType::Merchant)
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<Self, UserError> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .first(conn)
            .await
            .optional()?
            .ok_or(UserError::NotFound)
    }

    /// Most recent account holding this phone, active or not
    pub async fn find_by_phone(
        conn: &mut AsyncPgConnection,
        phone: &str,
    ) -> Result<Option<Self>, UserError> {
        Ok(users::table
            .filter(users::phone_number.eq(phone))
            .order((users::is_active.desc(), users::created_at.desc()))
            .select(User::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    /// Insert a user; a unique violation on the active-phone index maps to PhoneTaken
    pub async fn create(conn: &mut AsyncPgConnection, new_user: NewUser) -> Result<Self, UserError> {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(conn)
            .await
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    UserError::PhoneTaken
                },
                other => UserError::Database(other),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_round_trip() {
        for role in [UserType::Client, UserType::Merchant, UserType::Admin] {
            assert_eq!(UserType::from_string(role.as_str()), Ok(role));
        }
        assert!(UserType::from_string("vendor").is_err());
    }
}
