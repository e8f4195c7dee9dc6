// libs/booking-wizard-cell/src/services/sequencer.rs
use crate::models::QueryKind;

/// Monotonic request numbers, one counter per query kind. Only a result whose
/// number is the latest issued for its kind may be applied.
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    slots: u64,
    staff: u64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, kind: QueryKind) -> u64 {
        let counter = self.counter_mut(kind);
        *counter += 1;
        *counter
    }

    pub fn latest(&self, kind: QueryKind) -> u64 {
        match kind {
            QueryKind::Slots => self.slots,
            QueryKind::Staff => self.staff,
        }
    }

    pub fn is_latest(&self, kind: QueryKind, sequence: u64) -> bool {
        sequence == self.latest(kind)
    }

    /// Make every outstanding request of this kind stale.
    pub fn invalidate(&mut self, kind: QueryKind) {
        self.issue(kind);
    }

    fn counter_mut(&mut self, kind: QueryKind) -> &mut u64 {
        match kind {
            QueryKind::Slots => &mut self.slots,
            QueryKind::Staff => &mut self.staff,
        }
    }
}
