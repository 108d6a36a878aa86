//! Generation tickets for stale-result detection.
//!
//! Every invocation of a rule slot takes a ticket. Issuing a ticket
//! supersedes all earlier ones, so when an asynchronous result arrives the
//! slot can tell whether a newer invocation started in the meantime.
//! Revoking (on reset or dispose) starts a new epoch: results carrying a
//! ticket from an older epoch are fully inert.

/// Captured at invocation start, compared when the result arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    seq: u64,
}

/// Standing of a ticket when its result arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    /// Still the latest invocation; its result is authoritative
    Current,
    /// A newer invocation started; the result must not touch state
    Superseded,
    /// The slot was reset or disposed; the result is fully inert
    Revoked,
}

/// Per-slot ticket counter
#[derive(Debug, Default)]
pub struct GenerationBuffer {
    epoch: u64,
    latest: u64,
}

impl GenerationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, superseding every earlier one.
    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket {
            epoch: self.epoch,
            seq: self.latest,
        }
    }

    /// Classify an arriving result.
    pub fn status(&self, ticket: Ticket) -> TicketStatus {
        if ticket.epoch != self.epoch {
            TicketStatus::Revoked
        } else if ticket.seq == self.latest {
            TicketStatus::Current
        } else {
            TicketStatus::Superseded
        }
    }

    /// Invalidate every ticket issued so far.
    pub fn revoke_all(&mut self) {
        self.epoch += 1;
    }
}
