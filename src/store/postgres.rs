use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{
    Delivery, DeliveryChanges, DeliveryProblem, Deliveryman, DeliverymanChanges, NewDelivery,
    NewDeliveryProblem, NewDeliveryman, NewRecipient, NewStoredFile, NewUser, Recipient,
    RecipientChanges, StoredFile, User,
};
use crate::schema::{deliveries, delivery_problems, deliverymen, files, recipients, users};

use super::{
    DeliveryStore, DeliverymanStore, FileStore, Page, Pagination, ProblemStore, RecipientStore,
    UserStore,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Diesel-backed store. Queries run synchronously on the pooled connection,
/// one checkout per call.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PgPooledConnection> {
        self.pool
            .get()
            .context("failed to check out a database connection")
    }
}

fn contains(q: &str) -> String {
    format!("%{q}%")
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser, now: NaiveDateTime) -> Result<User> {
        let mut conn = self.conn()?;
        diesel::insert_into(users::table)
            .values((&user, users::created_at.eq(now), users::updated_at.eq(now)))
            .execute(&mut conn)?;
        let row = users::table.find(user.id).first(&mut conn)?;
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let mut conn = self.conn()?;
        let row = users::table.find(id).first(&mut conn).optional()?;
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut conn = self.conn()?;
        let row = users::table
            .filter(users::email.eq(email))
            .first(&mut conn)
            .optional()?;
        Ok(row)
    }
}

#[async_trait]
impl FileStore for PgStore {
    async fn create_file(&self, file: NewStoredFile, now: NaiveDateTime) -> Result<StoredFile> {
        let mut conn = self.conn()?;
        diesel::insert_into(files::table)
            .values((&file, files::created_at.eq(now), files::updated_at.eq(now)))
            .execute(&mut conn)?;
        let row = files::table.find(file.id).first(&mut conn)?;
        Ok(row)
    }

    async fn find_file(&self, id: Uuid) -> Result<Option<StoredFile>> {
        let mut conn = self.conn()?;
        let row = files::table.find(id).first(&mut conn).optional()?;
        Ok(row)
    }

    async fn find_file_by_path(&self, path: &str) -> Result<Option<StoredFile>> {
        let mut conn = self.conn()?;
        let row = files::table
            .filter(files::path.eq(path))
            .first(&mut conn)
            .optional()?;
        Ok(row)
    }

    async fn find_files(&self, ids: &[Uuid]) -> Result<Vec<StoredFile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        let rows = files::table
            .filter(files::id.eq_any(ids))
            .load(&mut conn)?;
        Ok(rows)
    }
}

#[async_trait]
impl RecipientStore for PgStore {
    async fn create_recipient(
        &self,
        recipient: NewRecipient,
        now: NaiveDateTime,
    ) -> Result<Recipient> {
        let mut conn = self.conn()?;
        diesel::insert_into(recipients::table)
            .values((
                &recipient,
                recipients::created_at.eq(now),
                recipients::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        let row = recipients::table.find(recipient.id).first(&mut conn)?;
        Ok(row)
    }

    async fn find_recipient(&self, id: Uuid) -> Result<Option<Recipient>> {
        let mut conn = self.conn()?;
        let row = recipients::table.find(id).first(&mut conn).optional()?;
        Ok(row)
    }

    async fn find_recipient_by_name(&self, name: &str) -> Result<Option<Recipient>> {
        let mut conn = self.conn()?;
        let row = recipients::table
            .filter(recipients::name.eq(name))
            .first(&mut conn)
            .optional()?;
        Ok(row)
    }

    async fn update_recipient(
        &self,
        id: Uuid,
        changes: &RecipientChanges,
        now: NaiveDateTime,
    ) -> Result<Recipient> {
        let mut conn = self.conn()?;
        diesel::update(recipients::table.find(id))
            .set((changes, recipients::updated_at.eq(now)))
            .execute(&mut conn)?;
        let row = recipients::table.find(id).first(&mut conn)?;
        Ok(row)
    }

    async fn list_recipients(&self, q: Option<&str>, page: Pagination) -> Result<Page<Recipient>> {
        let mut conn = self.conn()?;

        let mut count_query = recipients::table.into_boxed();
        let mut rows_query = recipients::table.into_boxed();
        if let Some(q) = q {
            count_query = count_query.filter(recipients::name.ilike(contains(q)));
            rows_query = rows_query.filter(recipients::name.ilike(contains(q)));
        }

        let total: i64 = count_query.count().get_result(&mut conn)?;
        let rows = rows_query
            .order(recipients::created_at.asc())
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut conn)?;
        Ok(Page::new(rows, total, page.limit))
    }

    async fn find_recipients(&self, ids: &[Uuid]) -> Result<Vec<Recipient>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        let rows = recipients::table
            .filter(recipients::id.eq_any(ids))
            .load(&mut conn)?;
        Ok(rows)
    }
}

#[async_trait]
impl DeliverymanStore for PgStore {
    async fn create_deliveryman(
        &self,
        deliveryman: NewDeliveryman,
        now: NaiveDateTime,
    ) -> Result<Deliveryman> {
        let mut conn = self.conn()?;
        diesel::insert_into(deliverymen::table)
            .values((
                &deliveryman,
                deliverymen::created_at.eq(now),
                deliverymen::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        let row = deliverymen::table.find(deliveryman.id).first(&mut conn)?;
        Ok(row)
    }

    async fn find_deliveryman(&self, id: Uuid) -> Result<Option<Deliveryman>> {
        let mut conn = self.conn()?;
        let row = deliverymen::table.find(id).first(&mut conn).optional()?;
        Ok(row)
    }

    async fn find_deliveryman_by_name(&self, name: &str) -> Result<Option<Deliveryman>> {
        let mut conn = self.conn()?;
        let row = deliverymen::table
            .filter(deliverymen::name.eq(name))
            .first(&mut conn)
            .optional()?;
        Ok(row)
    }

    async fn find_deliveryman_by_email(&self, email: &str) -> Result<Option<Deliveryman>> {
        let mut conn = self.conn()?;
        let row = deliverymen::table
            .filter(deliverymen::email.eq(email))
            .first(&mut conn)
            .optional()?;
        Ok(row)
    }

    async fn update_deliveryman(
        &self,
        id: Uuid,
        changes: &DeliverymanChanges,
        now: NaiveDateTime,
    ) -> Result<Deliveryman> {
        let mut conn = self.conn()?;
        diesel::update(deliverymen::table.find(id))
            .set((changes, deliverymen::updated_at.eq(now)))
            .execute(&mut conn)?;
        let row = deliverymen::table.find(id).first(&mut conn)?;
        Ok(row)
    }

    async fn delete_deliveryman(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::delete(deliverymen::table.find(id)).execute(&mut conn)?;
        Ok(())
    }

    async fn list_deliverymen(
        &self,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<Page<Deliveryman>> {
        let mut conn = self.conn()?;

        let mut count_query = deliverymen::table.into_boxed();
        let mut rows_query = deliverymen::table.into_boxed();
        if let Some(q) = q {
            count_query = count_query.filter(deliverymen::name.ilike(contains(q)));
            rows_query = rows_query.filter(deliverymen::name.ilike(contains(q)));
        }

        let total: i64 = count_query.count().get_result(&mut conn)?;
        let rows = rows_query
            .order(deliverymen::created_at.asc())
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut conn)?;
        Ok(Page::new(rows, total, page.limit))
    }

    async fn find_deliverymen(&self, ids: &[Uuid]) -> Result<Vec<Deliveryman>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        let rows = deliverymen::table
            .filter(deliverymen::id.eq_any(ids))
            .load(&mut conn)?;
        Ok(rows)
    }
}

#[async_trait]
impl DeliveryStore for PgStore {
    async fn create_delivery(&self, delivery: NewDelivery, now: NaiveDateTime) -> Result<Delivery> {
        let mut conn = self.conn()?;
        diesel::insert_into(deliveries::table)
            .values((
                &delivery,
                deliveries::created_at.eq(now),
                deliveries::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        let row = deliveries::table.find(delivery.id).first(&mut conn)?;
        Ok(row)
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>> {
        let mut conn = self.conn()?;
        let row = deliveries::table.find(id).first(&mut conn).optional()?;
        Ok(row)
    }

    async fn find_deliveries(&self, ids: &[Uuid]) -> Result<Vec<Delivery>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        let rows = deliveries::table
            .filter(deliveries::id.eq_any(ids))
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn update_delivery(
        &self,
        id: Uuid,
        changes: &DeliveryChanges,
        now: NaiveDateTime,
    ) -> Result<Delivery> {
        let mut conn = self.conn()?;
        diesel::update(deliveries::table.find(id))
            .set((changes, deliveries::updated_at.eq(now)))
            .execute(&mut conn)?;
        let row = deliveries::table.find(id).first(&mut conn)?;
        Ok(row)
    }

    async fn mark_collected(&self, id: Uuid, start: NaiveDateTime) -> Result<Delivery> {
        let mut conn = self.conn()?;
        diesel::update(deliveries::table.find(id))
            .set((
                deliveries::start_date.eq(start),
                deliveries::updated_at.eq(start),
            ))
            .execute(&mut conn)?;
        let row = deliveries::table.find(id).first(&mut conn)?;
        Ok(row)
    }

    async fn mark_delivered(
        &self,
        id: Uuid,
        end: NaiveDateTime,
        signature_id: Uuid,
    ) -> Result<Delivery> {
        let mut conn = self.conn()?;
        diesel::update(deliveries::table.find(id))
            .set((
                deliveries::end_date.eq(end),
                deliveries::signature_id.eq(signature_id),
                deliveries::updated_at.eq(end),
            ))
            .execute(&mut conn)?;
        let row = deliveries::table.find(id).first(&mut conn)?;
        Ok(row)
    }

    async fn mark_canceled(&self, id: Uuid, at: NaiveDateTime) -> Result<Delivery> {
        let mut conn = self.conn()?;
        diesel::update(deliveries::table.find(id))
            .set((
                deliveries::canceled_at.eq(at),
                deliveries::updated_at.eq(at),
            ))
            .execute(&mut conn)?;
        let row = deliveries::table.find(id).first(&mut conn)?;
        Ok(row)
    }

    async fn count_collections_between(
        &self,
        deliveryman_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let total = deliveries::table
            .filter(deliveries::deliveryman_id.eq(deliveryman_id))
            .filter(deliveries::canceled_at.is_null())
            .filter(deliveries::start_date.ge(from))
            .filter(deliveries::start_date.lt(to))
            .count()
            .get_result(&mut conn)?;
        Ok(total)
    }

    async fn list_deliveries(&self, q: Option<&str>, page: Pagination) -> Result<Page<Delivery>> {
        let mut conn = self.conn()?;

        let mut count_query = deliveries::table.into_boxed();
        let mut rows_query = deliveries::table.into_boxed();
        if let Some(q) = q {
            count_query = count_query.filter(deliveries::product.ilike(contains(q)));
            rows_query = rows_query.filter(deliveries::product.ilike(contains(q)));
        }

        let total: i64 = count_query.count().get_result(&mut conn)?;
        let rows = rows_query
            .order(deliveries::created_at.asc())
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut conn)?;
        Ok(Page::new(rows, total, page.limit))
    }

    async fn list_deliveries_for_deliveryman(
        &self,
        deliveryman_id: Uuid,
        delivered: bool,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<Page<Delivery>> {
        let mut conn = self.conn()?;

        let mut count_query = deliveries::table
            .filter(deliveries::deliveryman_id.eq(deliveryman_id))
            .filter(deliveries::canceled_at.is_null())
            .into_boxed();
        let mut rows_query = deliveries::table
            .filter(deliveries::deliveryman_id.eq(deliveryman_id))
            .filter(deliveries::canceled_at.is_null())
            .into_boxed();
        if delivered {
            count_query = count_query.filter(deliveries::end_date.is_not_null());
            rows_query = rows_query.filter(deliveries::end_date.is_not_null());
        } else {
            count_query = count_query.filter(deliveries::end_date.is_null());
            rows_query = rows_query.filter(deliveries::end_date.is_null());
        }
        if let Some(q) = q {
            count_query = count_query.filter(deliveries::product.ilike(contains(q)));
            rows_query = rows_query.filter(deliveries::product.ilike(contains(q)));
        }

        let total: i64 = count_query.count().get_result(&mut conn)?;
        let rows = rows_query
            .order(deliveries::created_at.asc())
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut conn)?;
        Ok(Page::new(rows, total, page.limit))
    }
}

#[async_trait]
impl ProblemStore for PgStore {
    async fn create_problem(
        &self,
        problem: NewDeliveryProblem,
        now: NaiveDateTime,
    ) -> Result<DeliveryProblem> {
        let mut conn = self.conn()?;
        diesel::insert_into(delivery_problems::table)
            .values((
                &problem,
                delivery_problems::created_at.eq(now),
                delivery_problems::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        let row = delivery_problems::table.find(problem.id).first(&mut conn)?;
        Ok(row)
    }

    async fn find_problem(&self, id: Uuid) -> Result<Option<DeliveryProblem>> {
        let mut conn = self.conn()?;
        let row = delivery_problems::table
            .find(id)
            .first(&mut conn)
            .optional()?;
        Ok(row)
    }

    async fn list_problems(
        &self,
        delivery_id: Option<Uuid>,
        page: Pagination,
    ) -> Result<Page<DeliveryProblem>> {
        let mut conn = self.conn()?;

        let mut count_query = delivery_problems::table.into_boxed();
        let mut rows_query = delivery_problems::table.into_boxed();
        if let Some(delivery_id) = delivery_id {
            count_query = count_query.filter(delivery_problems::delivery_id.eq(delivery_id));
            rows_query = rows_query.filter(delivery_problems::delivery_id.eq(delivery_id));
        }

        let total: i64 = count_query.count().get_result(&mut conn)?;
        let rows = rows_query
            .order(delivery_problems::created_at.asc())
            .offset(page.offset())
            .limit(page.limit)
            .load(&mut conn)?;
        Ok(Page::new(rows, total, page.limit))
    }

    async fn delete_problem(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn()?;
        diesel::delete(delivery_problems::table.find(id)).execute(&mut conn)?;
        Ok(())
    }
}
