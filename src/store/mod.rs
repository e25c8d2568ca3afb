//! Keyed persistence for users and tickets.
//!
//! `RecordStore` is the only synchronization point of the server. Two
//! backends exist: Postgres through sqlx, and an in-memory map used when no
//! database is configured and in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::tickets::{
    model::{NewTicket, Ticket, TicketChanges},
    query::TicketQuery,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl UniqueField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Username => "Username",
            Self::Email => "Email",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {}", .0.as_str())]
    Duplicate(UniqueField),

    #[error("ticket owner does not exist")]
    UnknownOwner,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Fails with `UnknownOwner` when `ticket.user_id` has no user.
    async fn insert_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket>;
    async fn find_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>>;
    /// Writes only the fields present in `changes` and refreshes `updated_at`.
    async fn update_ticket(&self, id: Uuid, changes: &TicketChanges)
        -> StoreResult<Option<Ticket>>;
    /// Returns the deleted row.
    async fn delete_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>>;
    async fn query_tickets(&self, query: &TicketQuery) -> StoreResult<Vec<Ticket>>;
}
