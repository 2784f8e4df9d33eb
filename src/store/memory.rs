use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::models::{
    Delivery, DeliveryChanges, DeliveryProblem, Deliveryman, DeliverymanChanges, NewDelivery,
    NewDeliveryProblem, NewDeliveryman, NewRecipient, NewStoredFile, NewUser, Recipient,
    RecipientChanges, StoredFile, User,
};

use super::{
    DeliveryStore, DeliverymanStore, FileStore, Page, Pagination, ProblemStore, RecipientStore,
    UserStore,
};

/// In-process store with the same observable behavior as `PgStore`. Used by
/// the test suite and by the server when no `DATABASE_URL` is configured.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    files: Vec<StoredFile>,
    recipients: Vec<Recipient>,
    deliverymen: Vec<Deliveryman>,
    deliveries: Vec<Delivery>,
    problems: Vec<DeliveryProblem>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn matches_q(value: &str, q: Option<&str>) -> bool {
    match q {
        Some(q) => value.to_lowercase().contains(&q.to_lowercase()),
        None => true,
    }
}

fn paginate<T: Clone>(rows: Vec<T>, page: Pagination) -> Page<T> {
    let total = rows.len() as i64;
    let start = page.offset().min(total) as usize;
    let end = (page.offset() + page.limit).min(total) as usize;
    Page::new(rows[start..end].to_vec(), total, page.limit)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser, now: NaiveDateTime) -> Result<User> {
        let mut inner = self.write();
        let row = User {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(row.clone());
        Ok(row)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.read().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .read()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn create_file(&self, file: NewStoredFile, now: NaiveDateTime) -> Result<StoredFile> {
        let mut inner = self.write();
        let row = StoredFile {
            id: file.id,
            name: file.name,
            path: file.path,
            created_at: now,
            updated_at: now,
        };
        inner.files.push(row.clone());
        Ok(row)
    }

    async fn find_file(&self, id: Uuid) -> Result<Option<StoredFile>> {
        Ok(self.read().files.iter().find(|f| f.id == id).cloned())
    }

    async fn find_file_by_path(&self, path: &str) -> Result<Option<StoredFile>> {
        Ok(self.read().files.iter().find(|f| f.path == path).cloned())
    }

    async fn find_files(&self, ids: &[Uuid]) -> Result<Vec<StoredFile>> {
        Ok(self
            .read()
            .files
            .iter()
            .filter(|f| ids.contains(&f.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecipientStore for MemoryStore {
    async fn create_recipient(
        &self,
        recipient: NewRecipient,
        now: NaiveDateTime,
    ) -> Result<Recipient> {
        let mut inner = self.write();
        let row = Recipient {
            id: recipient.id,
            name: recipient.name,
            street: recipient.street,
            number: recipient.number,
            complement: recipient.complement,
            state: recipient.state,
            city: recipient.city,
            zip_code: recipient.zip_code,
            created_at: now,
            updated_at: now,
        };
        inner.recipients.push(row.clone());
        Ok(row)
    }

    async fn find_recipient(&self, id: Uuid) -> Result<Option<Recipient>> {
        Ok(self.read().recipients.iter().find(|r| r.id == id).cloned())
    }

    async fn find_recipient_by_name(&self, name: &str) -> Result<Option<Recipient>> {
        Ok(self
            .read()
            .recipients
            .iter()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn update_recipient(
        &self,
        id: Uuid,
        changes: &RecipientChanges,
        now: NaiveDateTime,
    ) -> Result<Recipient> {
        let mut inner = self.write();
        let row = inner
            .recipients
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow!("recipient {id} not found"))?;
        if let Some(name) = &changes.name {
            row.name = name.clone();
        }
        if let Some(street) = &changes.street {
            row.street = Some(street.clone());
        }
        if let Some(number) = &changes.number {
            row.number = Some(number.clone());
        }
        if let Some(complement) = &changes.complement {
            row.complement = Some(complement.clone());
        }
        if let Some(state) = &changes.state {
            row.state = Some(state.clone());
        }
        if let Some(city) = &changes.city {
            row.city = Some(city.clone());
        }
        if let Some(zip_code) = &changes.zip_code {
            row.zip_code = Some(zip_code.clone());
        }
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn list_recipients(&self, q: Option<&str>, page: Pagination) -> Result<Page<Recipient>> {
        let rows: Vec<Recipient> = self
            .read()
            .recipients
            .iter()
            .filter(|r| matches_q(&r.name, q))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn find_recipients(&self, ids: &[Uuid]) -> Result<Vec<Recipient>> {
        Ok(self
            .read()
            .recipients
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeliverymanStore for MemoryStore {
    async fn create_deliveryman(
        &self,
        deliveryman: NewDeliveryman,
        now: NaiveDateTime,
    ) -> Result<Deliveryman> {
        let mut inner = self.write();
        let row = Deliveryman {
            id: deliveryman.id,
            name: deliveryman.name,
            email: deliveryman.email,
            avatar_id: deliveryman.avatar_id,
            created_at: now,
            updated_at: now,
        };
        inner.deliverymen.push(row.clone());
        Ok(row)
    }

    async fn find_deliveryman(&self, id: Uuid) -> Result<Option<Deliveryman>> {
        Ok(self.read().deliverymen.iter().find(|d| d.id == id).cloned())
    }

    async fn find_deliveryman_by_name(&self, name: &str) -> Result<Option<Deliveryman>> {
        Ok(self
            .read()
            .deliverymen
            .iter()
            .find(|d| d.name == name)
            .cloned())
    }

    async fn find_deliveryman_by_email(&self, email: &str) -> Result<Option<Deliveryman>> {
        Ok(self
            .read()
            .deliverymen
            .iter()
            .find(|d| d.email == email)
            .cloned())
    }

    async fn update_deliveryman(
        &self,
        id: Uuid,
        changes: &DeliverymanChanges,
        now: NaiveDateTime,
    ) -> Result<Deliveryman> {
        let mut inner = self.write();
        let row = inner
            .deliverymen
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow!("deliveryman {id} not found"))?;
        if let Some(name) = &changes.name {
            row.name = name.clone();
        }
        if let Some(email) = &changes.email {
            row.email = email.clone();
        }
        if let Some(avatar_id) = changes.avatar_id {
            row.avatar_id = Some(avatar_id);
        }
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn delete_deliveryman(&self, id: Uuid) -> Result<()> {
        let mut inner = self.write();
        inner.deliverymen.retain(|d| d.id != id);
        // Same effect as the foreign key's ON DELETE SET NULL.
        for delivery in inner
            .deliveries
            .iter_mut()
            .filter(|d| d.deliveryman_id == Some(id))
        {
            delivery.deliveryman_id = None;
        }
        Ok(())
    }

    async fn list_deliverymen(
        &self,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<Page<Deliveryman>> {
        let rows: Vec<Deliveryman> = self
            .read()
            .deliverymen
            .iter()
            .filter(|d| matches_q(&d.name, q))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn find_deliverymen(&self, ids: &[Uuid]) -> Result<Vec<Deliveryman>> {
        Ok(self
            .read()
            .deliverymen
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn create_delivery(&self, delivery: NewDelivery, now: NaiveDateTime) -> Result<Delivery> {
        let mut inner = self.write();
        let row = Delivery {
            id: delivery.id,
            product: delivery.product,
            recipient_id: Some(delivery.recipient_id),
            deliveryman_id: Some(delivery.deliveryman_id),
            signature_id: None,
            start_date: None,
            end_date: None,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.deliveries.push(row.clone());
        Ok(row)
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>> {
        Ok(self.read().deliveries.iter().find(|d| d.id == id).cloned())
    }

    async fn find_deliveries(&self, ids: &[Uuid]) -> Result<Vec<Delivery>> {
        Ok(self
            .read()
            .deliveries
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn update_delivery(
        &self,
        id: Uuid,
        changes: &DeliveryChanges,
        now: NaiveDateTime,
    ) -> Result<Delivery> {
        let mut inner = self.write();
        let row = inner
            .deliveries
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow!("delivery {id} not found"))?;
        if let Some(product) = &changes.product {
            row.product = product.clone();
        }
        if let Some(recipient_id) = changes.recipient_id {
            row.recipient_id = Some(recipient_id);
        }
        if let Some(deliveryman_id) = changes.deliveryman_id {
            row.deliveryman_id = Some(deliveryman_id);
        }
        if let Some(signature_id) = changes.signature_id {
            row.signature_id = Some(signature_id);
        }
        if let Some(start_date) = changes.start_date {
            row.start_date = Some(start_date);
        }
        if let Some(end_date) = changes.end_date {
            row.end_date = Some(end_date);
        }
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn mark_collected(&self, id: Uuid, start: NaiveDateTime) -> Result<Delivery> {
        let mut inner = self.write();
        let row = inner
            .deliveries
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow!("delivery {id} not found"))?;
        row.start_date = Some(start);
        row.updated_at = start;
        Ok(row.clone())
    }

    async fn mark_delivered(
        &self,
        id: Uuid,
        end: NaiveDateTime,
        signature_id: Uuid,
    ) -> Result<Delivery> {
        let mut inner = self.write();
        let row = inner
            .deliveries
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow!("delivery {id} not found"))?;
        row.end_date = Some(end);
        row.signature_id = Some(signature_id);
        row.updated_at = end;
        Ok(row.clone())
    }

    async fn mark_canceled(&self, id: Uuid, at: NaiveDateTime) -> Result<Delivery> {
        let mut inner = self.write();
        let row = inner
            .deliveries
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow!("delivery {id} not found"))?;
        row.canceled_at = Some(at);
        row.updated_at = at;
        Ok(row.clone())
    }

    async fn count_collections_between(
        &self,
        deliveryman_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<i64> {
        let count = self
            .read()
            .deliveries
            .iter()
            .filter(|d| d.deliveryman_id == Some(deliveryman_id))
            .filter(|d| d.canceled_at.is_none())
            .filter(|d| matches!(d.start_date, Some(start) if start >= from && start < to))
            .count();
        Ok(count as i64)
    }

    async fn list_deliveries(&self, q: Option<&str>, page: Pagination) -> Result<Page<Delivery>> {
        let rows: Vec<Delivery> = self
            .read()
            .deliveries
            .iter()
            .filter(|d| matches_q(&d.product, q))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn list_deliveries_for_deliveryman(
        &self,
        deliveryman_id: Uuid,
        delivered: bool,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<Page<Delivery>> {
        let rows: Vec<Delivery> = self
            .read()
            .deliveries
            .iter()
            .filter(|d| d.deliveryman_id == Some(deliveryman_id))
            .filter(|d| d.canceled_at.is_none())
            .filter(|d| d.end_date.is_some() == delivered)
            .filter(|d| matches_q(&d.product, q))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }
}

#[async_trait]
impl ProblemStore for MemoryStore {
    async fn create_problem(
        &self,
        problem: NewDeliveryProblem,
        now: NaiveDateTime,
    ) -> Result<DeliveryProblem> {
        let mut inner = self.write();
        let row = DeliveryProblem {
            id: problem.id,
            delivery_id: problem.delivery_id,
            description: problem.description,
            created_at: now,
            updated_at: now,
        };
        inner.problems.push(row.clone());
        Ok(row)
    }

    async fn find_problem(&self, id: Uuid) -> Result<Option<DeliveryProblem>> {
        Ok(self.read().problems.iter().find(|p| p.id == id).cloned())
    }

    async fn list_problems(
        &self,
        delivery_id: Option<Uuid>,
        page: Pagination,
    ) -> Result<Page<DeliveryProblem>> {
        let rows: Vec<DeliveryProblem> = self
            .read()
            .problems
            .iter()
            .filter(|p| delivery_id.map_or(true, |id| p.delivery_id == id))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn delete_problem(&self, id: Uuid) -> Result<()> {
        let mut inner = self.write();
        inner.problems.retain(|p| p.id != id);
        Ok(())
    }
}
