//! Superseded-request detection.
//!
//! A consumer scrubbing through time may issue a new query before the
//! previous one resolves. Nothing is cancelled: each query takes a
//! [`Ticket`], and a result is kept only if its ticket is still the newest.

use std::sync::atomic::{AtomicU64, Ordering};

/// Proof of when a request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    /// Counter value the ticket was issued at.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.0
    }
}

/// Monotonic request counter shared by one consumer's queries.
#[derive(Debug, Default)]
pub struct RequestGeneration {
    latest: AtomicU64,
}

impl RequestGeneration {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request, superseding every earlier ticket.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// True if no newer ticket has been issued since `ticket`.
    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Keeps `result` only if `ticket` is still current.
    pub fn accept<T>(&self, ticket: Ticket, result: T) -> Option<T> {
        self.is_current(ticket).then_some(result)
    }
}
