use uuid::Uuid;

use super::model::{Ticket, TicketPriority, TicketStatus};

/// Filter over tickets. Every supplied constraint must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    owner: Option<Uuid>,
    status: Option<TicketStatus>,
    priority: Option<TicketPriority>,
}

impl TicketQuery {
    /// Query restricted to one owner's tickets. Request handlers only build these.
    pub fn owned_by(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            ..Default::default()
        }
    }

    /// Unrestricted query across all owners.
    pub fn any_owner() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Option<TicketStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Option<TicketPriority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }

    pub fn status(&self) -> Option<TicketStatus> {
        self.status
    }

    pub fn priority(&self) -> Option<TicketPriority> {
        self.priority
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.owner.map_or(true, |o| ticket.user_id == o)
            && self.status.map_or(true, |s| ticket.status == s)
            && self.priority.map_or(true, |p| ticket.priority == p)
    }
}
