use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod guard;
pub mod handlers;
pub mod model;
pub mod query;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use model::{Ticket, TicketPriority, TicketStatus};

pub fn router() -> Router<AppState> {
    handlers::ticket_routes()
}
