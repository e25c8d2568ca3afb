use std::str::FromStr;

use tracing::info;
use uuid::Uuid;

use super::{
    dto::{CreateTicketRequest, FilterParams, UpdateTicketRequest},
    guard::authorize,
    model::{NewTicket, Ticket, TicketChanges, TicketPriority, TicketStatus, UnknownVariant},
    query::TicketQuery,
};
use crate::{
    error::{AppError, AppResult},
    store::RecordStore,
};

fn required_text(field: &'static str, label: &str, value: Option<String>) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(Some(field), format!("{label} is required"))),
    }
}

fn optional_text(field: &'static str, label: &str, value: Option<String>) -> AppResult<Option<String>> {
    value
        .map(|v| required_text(field, label, Some(v)))
        .transpose()
}

fn parse_enum<T>(field: &'static str, value: Option<&str>) -> AppResult<Option<T>>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .map(|v| v.parse::<T>())
        .transpose()
        .map_err(|e| AppError::validation(Some(field), e.to_string()))
}

/// Treats `?status=` the same as an absent parameter.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Validates each present field on its own; an empty patch is rejected.
pub fn validate_changes(req: UpdateTicketRequest) -> AppResult<TicketChanges> {
    let changes = TicketChanges {
        status: parse_enum::<TicketStatus>("status", req.status.as_deref())?,
        priority: parse_enum::<TicketPriority>("priority", req.priority.as_deref())?,
        title: optional_text("title", "Title", req.title)?,
        description: optional_text("description", "Description", req.description)?,
    };
    if changes.is_empty() {
        return Err(AppError::validation(None, "No fields to update"));
    }
    Ok(changes)
}

pub async fn create(
    store: &dyn RecordStore,
    owner: Uuid,
    req: CreateTicketRequest,
) -> AppResult<Ticket> {
    let new = NewTicket {
        user_id: owner,
        title: required_text("title", "Title", req.title)?,
        description: required_text("description", "Description", req.description)?,
        status: parse_enum("status", req.status.as_deref())?.unwrap_or_default(),
        priority: parse_enum("priority", req.priority.as_deref())?.unwrap_or_default(),
    };
    let ticket = store.insert_ticket(new).await?;
    info!(ticket_id = %ticket.id, %owner, status = %ticket.status, "ticket created");
    Ok(ticket)
}

pub async fn get(store: &dyn RecordStore, principal: Uuid, ticket_id: Uuid) -> AppResult<Ticket> {
    authorize(store, principal, ticket_id).await
}

pub async fn update(
    store: &dyn RecordStore,
    principal: Uuid,
    ticket_id: Uuid,
    req: UpdateTicketRequest,
) -> AppResult<Ticket> {
    let before = authorize(store, principal, ticket_id).await?;
    let changes = validate_changes(req)?;

    // The row may vanish between the guard and the write.
    let ticket = store
        .update_ticket(ticket_id, &changes)
        .await?
        .ok_or(AppError::NotFoundOrUnauthorized)?;

    if before.status != ticket.status {
        info!(%ticket_id, from = %before.status, to = %ticket.status, "ticket moved");
    } else {
        info!(%ticket_id, "ticket updated");
    }
    Ok(ticket)
}

pub async fn delete(store: &dyn RecordStore, principal: Uuid, ticket_id: Uuid) -> AppResult<Ticket> {
    authorize(store, principal, ticket_id).await?;
    let ticket = store
        .delete_ticket(ticket_id)
        .await?
        .ok_or(AppError::NotFoundOrUnauthorized)?;
    info!(%ticket_id, "ticket deleted");
    Ok(ticket)
}

pub async fn list_for_owner(store: &dyn RecordStore, owner: Uuid) -> AppResult<Vec<Ticket>> {
    Ok(store.query_tickets(&TicketQuery::owned_by(owner)).await?)
}

/// Owner-scoped filtered listing; the owner comes from the token, never the query string.
pub async fn filter(
    store: &dyn RecordStore,
    owner: Uuid,
    params: &FilterParams,
) -> AppResult<Vec<Ticket>> {
    let query = TicketQuery::owned_by(owner)
        .with_status(parse_enum("status", non_empty(&params.status))?)
        .with_priority(parse_enum("priority", non_empty(&params.priority))?);
    Ok(store.query_tickets(&query).await?)
}
