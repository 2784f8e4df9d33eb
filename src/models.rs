use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = files)]
pub struct StoredFile {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = files)]
pub struct NewStoredFile {
    pub id: Uuid,
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = recipients)]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = recipients)]
pub struct NewRecipient {
    pub id: Uuid,
    pub name: String,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
}

/// Partial update for a recipient. `None` fields are left untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = recipients)]
pub struct RecipientChanges {
    pub name: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = deliverymen)]
pub struct Deliveryman {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = deliverymen)]
pub struct NewDeliveryman {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = deliverymen)]
pub struct DeliverymanChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = deliveries)]
#[diesel(belongs_to(Recipient, foreign_key = recipient_id))]
#[diesel(belongs_to(Deliveryman, foreign_key = deliveryman_id))]
pub struct Delivery {
    pub id: Uuid,
    pub product: String,
    pub recipient_id: Option<Uuid>,
    pub deliveryman_id: Option<Uuid>,
    pub signature_id: Option<Uuid>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub canceled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Delivery {
    /// Lifecycle state derived from the timestamp columns. A cancellation
    /// wins over everything else, a registered end wins over a start.
    pub fn status(&self) -> DeliveryStatus {
        if self.canceled_at.is_some() {
            DeliveryStatus::Canceled
        } else if self.end_date.is_some() {
            DeliveryStatus::Delivered
        } else if self.start_date.is_some() {
            DeliveryStatus::Collected
        } else {
            DeliveryStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Collected,
    Delivered,
    Canceled,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = deliveries)]
pub struct NewDelivery {
    pub id: Uuid,
    pub product: String,
    pub recipient_id: Uuid,
    pub deliveryman_id: Uuid,
}

/// Administrative partial update for a delivery. `None` fields are left
/// untouched; workflow stamps (collection, drop-off, cancellation) go
/// through dedicated store calls instead.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = deliveries)]
pub struct DeliveryChanges {
    pub product: Option<String>,
    pub recipient_id: Option<Uuid>,
    pub deliveryman_id: Option<Uuid>,
    pub signature_id: Option<Uuid>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = delivery_problems)]
#[diesel(belongs_to(Delivery, foreign_key = delivery_id))]
pub struct DeliveryProblem {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = delivery_problems)]
pub struct NewDeliveryProblem {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub description: String,
}
