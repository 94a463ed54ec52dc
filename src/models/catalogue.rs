// Catalogue rows owned by the listing subsystem.
// Only the reads needed to count resources against tariff caps live here.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{images, merchant_contacts, services};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    ServiceImage,
    MerchantGallery,
    MerchantCover,
    UserAvatar,
}

impl ImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::ServiceImage => "service_image",
            ImageType::MerchantGallery => "merchant_gallery",
            ImageType::MerchantCover => "merchant_cover",
            ImageType::UserAvatar => "user_avatar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactType {
    Phone,
    SocialMedia,
}

impl ContactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Phone => "phone",
            ContactType::SocialMedia => "social_media",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = services)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Service {
    pub id: String,
    pub merchant_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub location_region: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        service_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        services::table
            .find(service_id)
            .select(Service::as_select())
            .first(conn)
            .await
            .optional()
    }
}

pub async fn count_active_services(
    conn: &mut AsyncPgConnection,
    merchant_id: Uuid,
) -> Result<i64, diesel::result::Error> {
    services::table
        .filter(services::merchant_id.eq(merchant_id))
        .filter(services::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
}

pub async fn count_active_images(
    conn: &mut AsyncPgConnection,
    image_type: ImageType,
    related_id: &str,
) -> Result<i64, diesel::result::Error> {
    images::table
        .filter(images::image_type.eq(image_type.as_str()))
        .filter(images::related_id.eq(related_id))
        .filter(images::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
}

pub async fn count_active_contacts(
    conn: &mut AsyncPgConnection,
    merchant_id: Uuid,
    contact_type: ContactType,
) -> Result<i64, diesel::result::Error> {
    merchant_contacts::table
        .filter(merchant_contacts::merchant_id.eq(merchant_id))
        .filter(merchant_contacts::contact_type.eq(contact_type.as_str()))
        .filter(merchant_contacts::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
}
