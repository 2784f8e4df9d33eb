//! Repository traits over the persisted entities. Handlers only ever see
//! these traits; `PgStore` backs them with diesel and `MemoryStore` keeps
//! everything in process for tests and for running without a database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::models::{
    Delivery, DeliveryChanges, DeliveryProblem, Deliveryman, DeliverymanChanges, NewDelivery,
    NewDeliveryProblem, NewDeliveryman, NewRecipient, NewStoredFile, NewUser, Recipient,
    RecipientChanges, StoredFile, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One page of rows plus the totals reported through response headers.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(rows: Vec<T>, total: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            rows,
            total,
            total_pages,
        }
    }
}

/// 1-based page selection; invalid values fall back to the defaults.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let default = Self::default();
        Self {
            page: page.filter(|p| *p >= 1).unwrap_or(default.page),
            limit: limit.filter(|l| *l >= 1).unwrap_or(default.limit),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser, now: NaiveDateTime) -> Result<User>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn create_file(&self, file: NewStoredFile, now: NaiveDateTime) -> Result<StoredFile>;
    async fn find_file(&self, id: Uuid) -> Result<Option<StoredFile>>;
    async fn find_file_by_path(&self, path: &str) -> Result<Option<StoredFile>>;
    /// Batch lookup for embedding; unknown ids are silently absent.
    async fn find_files(&self, ids: &[Uuid]) -> Result<Vec<StoredFile>>;
}

#[async_trait]
pub trait RecipientStore: Send + Sync {
    async fn create_recipient(
        &self,
        recipient: NewRecipient,
        now: NaiveDateTime,
    ) -> Result<Recipient>;
    async fn find_recipient(&self, id: Uuid) -> Result<Option<Recipient>>;
    async fn find_recipient_by_name(&self, name: &str) -> Result<Option<Recipient>>;
    async fn update_recipient(
        &self,
        id: Uuid,
        changes: &RecipientChanges,
        now: NaiveDateTime,
    ) -> Result<Recipient>;
    async fn list_recipients(&self, q: Option<&str>, page: Pagination) -> Result<Page<Recipient>>;
    async fn find_recipients(&self, ids: &[Uuid]) -> Result<Vec<Recipient>>;
}

#[async_trait]
pub trait DeliverymanStore: Send + Sync {
    async fn create_deliveryman(
        &self,
        deliveryman: NewDeliveryman,
        now: NaiveDateTime,
    ) -> Result<Deliveryman>;
    async fn find_deliveryman(&self, id: Uuid) -> Result<Option<Deliveryman>>;
    async fn find_deliveryman_by_name(&self, name: &str) -> Result<Option<Deliveryman>>;
    async fn find_deliveryman_by_email(&self, email: &str) -> Result<Option<Deliveryman>>;
    async fn update_deliveryman(
        &self,
        id: Uuid,
        changes: &DeliverymanChanges,
        now: NaiveDateTime,
    ) -> Result<Deliveryman>;
    async fn delete_deliveryman(&self, id: Uuid) -> Result<()>;
    async fn list_deliverymen(
        &self,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<Page<Deliveryman>>;
    async fn find_deliverymen(&self, ids: &[Uuid]) -> Result<Vec<Deliveryman>>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn create_delivery(&self, delivery: NewDelivery, now: NaiveDateTime) -> Result<Delivery>;
    async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>>;
    async fn find_deliveries(&self, ids: &[Uuid]) -> Result<Vec<Delivery>>;
    async fn update_delivery(
        &self,
        id: Uuid,
        changes: &DeliveryChanges,
        now: NaiveDateTime,
    ) -> Result<Delivery>;
    /// Collection: stamps start_date.
    async fn mark_collected(&self, id: Uuid, start: NaiveDateTime) -> Result<Delivery>;
    /// Drop-off: stamps end_date and attaches the signature file.
    async fn mark_delivered(
        &self,
        id: Uuid,
        end: NaiveDateTime,
        signature_id: Uuid,
    ) -> Result<Delivery>;
    /// Cancellation: stamps canceled_at; the row is never removed.
    async fn mark_canceled(&self, id: Uuid, at: NaiveDateTime) -> Result<Delivery>;
    /// Non-canceled deliveries of one deliveryman whose start_date lies in
    /// `[from, to)`. Feeds the daily collection cap.
    async fn count_collections_between(
        &self,
        deliveryman_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<i64>;
    async fn list_deliveries(&self, q: Option<&str>, page: Pagination) -> Result<Page<Delivery>>;
    /// A deliveryman's non-canceled deliveries; `delivered` selects the
    /// finished ones, otherwise only the unfinished remain.
    async fn list_deliveries_for_deliveryman(
        &self,
        deliveryman_id: Uuid,
        delivered: bool,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<Page<Delivery>>;
}

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn create_problem(
        &self,
        problem: NewDeliveryProblem,
        now: NaiveDateTime,
    ) -> Result<DeliveryProblem>;
    async fn find_problem(&self, id: Uuid) -> Result<Option<DeliveryProblem>>;
    async fn list_problems(
        &self,
        delivery_id: Option<Uuid>,
        page: Pagination,
    ) -> Result<Page<DeliveryProblem>>;
    async fn delete_problem(&self, id: Uuid) -> Result<()>;
}

/// Everything the application needs from persistence, as one object-safe
/// bundle for dependency injection.
pub trait Store:
    UserStore + FileStore + RecipientStore + DeliverymanStore + DeliveryStore + ProblemStore
{
}

impl<T> Store for T where
    T: UserStore + FileStore + RecipientStore + DeliverymanStore + DeliveryStore + ProblemStore
{
}
