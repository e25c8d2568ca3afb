//! In-memory backend.
//!
//! Holds both tables behind one `RwLock`, so each operation is atomic with
//! respect to the others. Data is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, StoreError, StoreResult, UniqueField};
use crate::auth::repo_types::{NewUser, User};
use crate::tickets::{
    model::{NewTicket, Ticket, TicketChanges},
    query::TicketQuery,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tickets: HashMap<Uuid, Ticket>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.inner.write().await;
        // username first, matching the order registration validates in
        if t.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.inner.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn insert_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket> {
        let mut t = self.inner.write().await;
        if !t.users.contains_key(&ticket.user_id) {
            return Err(StoreError::UnknownOwner);
        }
        let now = OffsetDateTime::now_utc();
        let record = Ticket {
            id: Uuid::new_v4(),
            user_id: ticket.user_id,
            title: ticket.title,
            description: ticket.description,
            status: ticket.status,
            priority: ticket.priority,
            created_at: now,
            updated_at: now,
        };
        t.tickets.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.inner.read().await.tickets.get(&id).cloned())
    }

    async fn update_ticket(
        &self,
        id: Uuid,
        changes: &TicketChanges,
    ) -> StoreResult<Option<Ticket>> {
        let mut t = self.inner.write().await;
        let Some(ticket) = t.tickets.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(ticket, OffsetDateTime::now_utc());
        Ok(Some(ticket.clone()))
    }

    async fn delete_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.inner.write().await.tickets.remove(&id))
    }

    async fn query_tickets(&self, query: &TicketQuery) -> StoreResult<Vec<Ticket>> {
        let t = self.inner.read().await;
        let mut out: Vec<Ticket> = t
            .tickets
            .values()
            .filter(|ticket| query.matches(ticket))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}
