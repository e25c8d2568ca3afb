//! Client-side Kanban board with optimistic column moves.
//!
//! A drag onto another column changes the local ticket at once and hands back
//! a [`PendingMove`]. The move is settled by passing it to
//! [`Board::confirm`] or [`Board::rollback`], both of which consume it, so a
//! move cannot be settled twice. The server response only wins if no newer
//! move on the same ticket was started in the meantime.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::api::{ApiError, TicketApi};
use crate::tickets::{dto::UpdateTicketRequest, Ticket, TicketStatus};

#[must_use = "a pending move must be confirmed or rolled back"]
#[derive(Debug)]
pub struct PendingMove {
    ticket_id: Uuid,
    from: TicketStatus,
    to: TicketStatus,
    generation: u64,
}

impl PendingMove {
    pub fn ticket_id(&self) -> Uuid {
        self.ticket_id
    }

    pub fn origin(&self) -> TicketStatus {
        self.from
    }

    pub fn target(&self) -> TicketStatus {
        self.to
    }
}

#[derive(Debug, Default)]
pub struct Board {
    tickets: Vec<Ticket>,
    /// Latest move generation per ticket.
    generations: HashMap<Uuid, u64>,
    /// Last status the server is known to hold, per ticket.
    confirmed: HashMap<Uuid, TicketStatus>,
    /// Unsettled moves per ticket.
    in_flight: HashMap<Uuid, usize>,
    banner: Option<String>,
}

impl Board {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        let confirmed = tickets.iter().map(|t| (t.id, t.status)).collect();
        Self {
            tickets,
            confirmed,
            ..Default::default()
        }
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn ticket(&self, id: Uuid) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    fn ticket_mut(&mut self, id: Uuid) -> Option<&mut Ticket> {
        self.tickets.iter_mut().find(|t| t.id == id)
    }

    pub fn column(&self, status: TicketStatus) -> Vec<&Ticket> {
        self.tickets.iter().filter(|t| t.status == status).collect()
    }

    /// Moves that were started but not yet confirmed or rolled back.
    pub fn pending_moves(&self) -> usize {
        self.in_flight.values().sum()
    }

    /// Error to show to the user, if any.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn insert(&mut self, ticket: Ticket) {
        self.replace(ticket);
    }

    /// Stores a server copy of `ticket`.
    pub fn replace(&mut self, ticket: Ticket) {
        self.confirmed.insert(ticket.id, ticket.status);
        match self.ticket_mut(ticket.id) {
            Some(slot) => *slot = ticket,
            None => self.tickets.push(ticket),
        }
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Ticket> {
        let idx = self.tickets.iter().position(|t| t.id == id)?;
        self.generations.remove(&id);
        self.confirmed.remove(&id);
        self.in_flight.remove(&id);
        Some(self.tickets.remove(idx))
    }

    /// Applies the move locally. `None` when the ticket is unknown or already there.
    pub fn begin_move(&mut self, id: Uuid, to: TicketStatus) -> Option<PendingMove> {
        let ticket = self.ticket_mut(id)?;
        if ticket.status == to {
            return None;
        }
        let from = ticket.status;
        ticket.status = to;

        let generation = self.generations.entry(id).or_insert(0);
        *generation += 1;
        let generation = *generation;
        *self.in_flight.entry(id).or_insert(0) += 1;
        debug!(ticket_id = %id, %from, %to, "optimistic move");

        Some(PendingMove {
            ticket_id: id,
            from,
            to,
            generation,
        })
    }

    /// Marks `mv` settled. True when the local ticket should now follow the
    /// server: `mv` is the newest move, or no other move on it is unsettled.
    fn settle(&mut self, mv: &PendingMove) -> bool {
        let latest = self.generations.get(&mv.ticket_id) == Some(&mv.generation);
        let left = match self.in_flight.get_mut(&mv.ticket_id) {
            Some(n) => {
                *n = n.saturating_sub(1);
                *n
            }
            None => 0,
        };
        if left == 0 {
            self.in_flight.remove(&mv.ticket_id);
        }
        latest || left == 0
    }

    /// Settles a move the server accepted.
    pub fn confirm(&mut self, mv: PendingMove, server: Ticket) {
        if self.settle(&mv) {
            self.replace(server);
        } else {
            self.confirmed.insert(server.id, server.status);
        }
    }

    /// Settles a move the server refused and surfaces the error.
    ///
    /// The ticket returns to the last status the server confirmed, never to
    /// an intermediate optimistic one.
    pub fn rollback(&mut self, mv: PendingMove, err: &ApiError) {
        let follows_server = self.settle(&mv);
        let title = self
            .ticket(mv.ticket_id)
            .map(|t| t.title.clone())
            .unwrap_or_default();
        warn!(ticket_id = %mv.ticket_id, error = %err, "move rejected, rolling back");

        if matches!(err, ApiError::NotFound(_)) {
            // gone on the server; keeping it would leave a ghost card
            self.remove(mv.ticket_id);
            self.banner = Some(format!("Ticket '{title}' no longer exists"));
            return;
        }

        if follows_server {
            let restore = self
                .confirmed
                .get(&mv.ticket_id)
                .copied()
                .unwrap_or(mv.from);
            if let Some(ticket) = self.ticket_mut(mv.ticket_id) {
                ticket.status = restore;
            }
        }
        self.banner = Some(format!("Could not move '{title}' to {}: {err}", mv.to));
    }
}

/// Runs one column move end to end.
///
/// The board lock is released while the request is in flight, so moves on
/// other tickets proceed independently. Returns `Ok(None)` for a no-op move.
pub async fn move_ticket(
    board: &Mutex<Board>,
    api: &dyn TicketApi,
    id: Uuid,
    to: TicketStatus,
) -> Result<Option<Ticket>, ApiError> {
    let Some(mv) = board.lock().await.begin_move(id, to) else {
        return Ok(None);
    };

    let patch = UpdateTicketRequest {
        status: Some(to.as_str().to_string()),
        ..Default::default()
    };
    let result = api.update_ticket(id, &patch).await;

    let mut board = board.lock().await;
    match result {
        Ok(ticket) => {
            board.confirm(mv, ticket.clone());
            Ok(Some(ticket))
        }
        Err(err) => {
            board.rollback(mv, &err);
            Err(err)
        }
    }
}
