use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    model::{NewTicket, TicketChanges, TicketPriority, TicketStatus},
    query::TicketQuery,
    repo_types::TicketRow,
};

const COLUMNS: &str = "id, user_id, title, description, status, priority, created_at, updated_at";

pub async fn insert(db: &PgPool, new: &NewTicket) -> sqlx::Result<TicketRow> {
    sqlx::query_as::<_, TicketRow>(&format!(
        r#"
        INSERT INTO tickets (user_id, title, description, status, priority)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(new.user_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.status.as_str())
    .bind(new.priority.as_str())
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<TicketRow>> {
    sqlx::query_as::<_, TicketRow>(&format!("SELECT {COLUMNS} FROM tickets WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Single-statement partial update: absent fields keep their stored value.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    changes: &TicketChanges,
) -> sqlx::Result<Option<TicketRow>> {
    sqlx::query_as::<_, TicketRow>(&format!(
        r#"
        UPDATE tickets
           SET title       = COALESCE($2, title),
               description = COALESCE($3, description),
               status      = COALESCE($4, status),
               priority    = COALESCE($5, priority),
               updated_at  = GREATEST(NOW(), updated_at)
         WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.status.map(TicketStatus::as_str))
    .bind(changes.priority.map(TicketPriority::as_str))
    .fetch_optional(db)
    .await
}

pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<Option<TicketRow>> {
    sqlx::query_as::<_, TicketRow>(&format!(
        "DELETE FROM tickets WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn query(db: &PgPool, q: &TicketQuery) -> sqlx::Result<Vec<TicketRow>> {
    let mut qb = select_for(q);
    qb.build_query_as::<TicketRow>().fetch_all(db).await
}

fn select_for(q: &TicketQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM tickets WHERE TRUE"));
    if let Some(owner) = q.owner() {
        qb.push(" AND user_id = ").push_bind(owner);
    }
    if let Some(status) = q.status() {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(priority) = q.priority() {
        qb.push(" AND priority = ").push_bind(priority.as_str());
    }
    qb.push(" ORDER BY created_at ASC, id ASC");
    qb
}
