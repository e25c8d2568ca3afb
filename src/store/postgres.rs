use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{RecordStore, StoreError, StoreResult, UniqueField};
use crate::auth::repo_types::{NewUser, User};
use crate::tickets::{
    model::{NewTicket, Ticket, TicketChanges},
    query::TicketQuery,
    repo,
    repo_types::TicketRow,
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Maps constraint violations onto the store taxonomy.
fn map_sqlx(e: sqlx::Error, op: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(c) if c.contains("username") => {
                    return StoreError::Duplicate(UniqueField::Username)
                }
                Some(c) if c.contains("email") => return StoreError::Duplicate(UniqueField::Email),
                _ => {}
            }
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::UnknownOwner;
        }
    }
    StoreError::Backend(anyhow::Error::new(e).context(op))
}

fn to_ticket(row: TicketRow) -> StoreResult<Ticket> {
    Ticket::try_from(row).map_err(StoreError::Backend)
}

fn to_ticket_opt(row: Option<TicketRow>) -> StoreResult<Option<Ticket>> {
    row.map(to_ticket).transpose()
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        User::create(&self.db, &user)
            .await
            .map_err(|e| map_sqlx(e, "insert user"))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        User::find_by_email(&self.db, email)
            .await
            .map_err(|e| map_sqlx(e, "find user by email"))
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        User::find_by_id(&self.db, id)
            .await
            .map_err(|e| map_sqlx(e, "find user by id"))
    }

    async fn insert_ticket(&self, ticket: NewTicket) -> StoreResult<Ticket> {
        let row = repo::insert(&self.db, &ticket)
            .await
            .map_err(|e| map_sqlx(e, "insert ticket"))?;
        to_ticket(row)
    }

    async fn find_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        let row = repo::find_by_id(&self.db, id)
            .await
            .map_err(|e| map_sqlx(e, "find ticket"))?;
        to_ticket_opt(row)
    }

    async fn update_ticket(
        &self,
        id: Uuid,
        changes: &TicketChanges,
    ) -> StoreResult<Option<Ticket>> {
        let row = repo::update(&self.db, id, changes)
            .await
            .map_err(|e| map_sqlx(e, "update ticket"))?;
        to_ticket_opt(row)
    }

    async fn delete_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        let row = repo::delete(&self.db, id)
            .await
            .map_err(|e| map_sqlx(e, "delete ticket"))?;
        to_ticket_opt(row)
    }

    async fn query_tickets(&self, query: &TicketQuery) -> StoreResult<Vec<Ticket>> {
        let rows = repo::query(&self.db, query)
            .await
            .map_err(|e| map_sqlx(e, "query tickets"))?;
        rows.into_iter().map(to_ticket).collect()
    }
}
