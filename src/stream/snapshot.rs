//! State snapshot cadence

use crate::game::Observables;

use super::frame::StateSnapshot;

/// Decides which ticks carry a state snapshot
pub struct SnapshotBuilder {
    /// Snapshot interval in ticks
    snapshot_interval: u64,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            snapshot_interval: u64::from(snapshot_interval.max(1)),
        }
    }

    /// Every Kth clock tick carries a snapshot, starting with tick 0 so new
    /// viewers get state right away. Keyed on the tick number, so a failed
    /// tick does not shift later snapshots.
    pub fn should_send(&self, tick: u64) -> bool {
        tick % self.snapshot_interval == 0
    }

    pub fn build(&self, tick: u64, observed: Observables) -> StateSnapshot {
        StateSnapshot {
            tick,
            health: observed.health,
            score: observed.score,
            position: observed.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_on_tick_zero_then_every_interval() {
        let builder = SnapshotBuilder::new(3);
        let sent: Vec<bool> = (0..7).map(|tick| builder.should_send(tick)).collect();
        assert_eq!(sent, vec![true, false, false, true, false, false, true]);
    }

    #[test]
    fn cadence_does_not_depend_on_which_ticks_were_checked() {
        let builder = SnapshotBuilder::new(4);
        // Tick 3 never asked (it failed)
        let sent: Vec<u64> = [0, 1, 2, 4, 5, 6, 7, 8]
            .into_iter()
            .filter(|&tick| builder.should_send(tick))
            .collect();
        assert_eq!(sent, vec![0, 4, 8]);
    }

    #[test]
    fn interval_of_zero_sends_every_tick() {
        let builder = SnapshotBuilder::new(0);
        assert!(builder.should_send(0));
        assert!(builder.should_send(1));
    }
}
