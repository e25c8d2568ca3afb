use anyhow::Context;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::Ticket;

/// Raw `tickets` row; enum columns are stored as text.
#[derive(Debug, FromRow)]
pub struct TicketRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = anyhow::Error;

    fn try_from(r: TicketRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: r
                .status
                .parse()
                .with_context(|| format!("ticket {} has corrupt status", r.id))?,
            priority: r
                .priority
                .parse()
                .with_context(|| format!("ticket {} has corrupt priority", r.id))?,
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
