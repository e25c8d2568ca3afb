use tracing::warn;
use uuid::Uuid;

use super::model::Ticket;
use crate::{error::AppError, store::RecordStore};

/// Loads `ticket_id` on behalf of `principal`.
///
/// A missing ticket and a ticket owned by someone else produce the same
/// error, so callers cannot probe for other users' ticket ids.
pub async fn authorize(
    store: &dyn RecordStore,
    principal: Uuid,
    ticket_id: Uuid,
) -> Result<Ticket, AppError> {
    match store.find_ticket(ticket_id).await? {
        Some(ticket) if ticket.user_id == principal => Ok(ticket),
        Some(_) => {
            warn!(%principal, %ticket_id, "access to foreign ticket denied");
            Err(AppError::NotFoundOrUnauthorized)
        }
        None => Err(AppError::NotFoundOrUnauthorized),
    }
}
