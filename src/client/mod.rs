//! Board client: typed HTTP calls plus the optimistic board state.

pub mod api;
pub mod board;

pub use api::{ApiClient, ApiError, Session, TicketApi};
pub use board::{move_ticket, Board, PendingMove};
