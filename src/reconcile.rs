// ===============================
// src/reconcile.rs (open-set diff)
// ===============================
use ahash::AHashSet as HashSet;

use crate::domain::Ticket;

/// Remembers the open-position snapshot of the previous successful cycle.
///
/// The stored set is replaced wholesale on every `observe_cycle`; it is never
/// merged. Callers must skip `observe_cycle` when the venue listing failed so the
/// last known-good snapshot survives until the next good cycle.
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    open: HashSet<Ticket>,
}

impl ReconciliationEngine {
    pub fn new() -> Self { Self::default() }

    /// Returns `previous - current` in ascending ticket order, then stores `current`.
    pub fn observe_cycle<I>(&mut self, current: I) -> Vec<Ticket>
    where
        I: IntoIterator<Item = Ticket>,
    {
        let current: HashSet<Ticket> = current.into_iter().collect();
        let mut closed: Vec<Ticket> = self.open.difference(&current).copied().collect();
        closed.sort_unstable();
        self.open = current;
        closed
    }

    pub fn open_count(&self) -> usize { self.open.len() }

    pub fn is_open(&self, ticket: Ticket) -> bool { self.open.contains(&ticket) }
}
