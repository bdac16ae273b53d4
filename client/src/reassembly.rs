//! Collects the datagram parts of a snapshot until the whole tick is in.

use log::{debug, warn};
use shared::Snapshot;
use std::collections::BTreeMap;

/// Buffers the parts of one tick at a time. A part from a newer tick abandons
/// an incomplete older one, since that tick is already out of date.
#[derive(Default)]
pub struct SnapshotAssembler {
    tick: Option<u64>,
    parts: u16,
    received: BTreeMap<u16, Snapshot>,
}

impl SnapshotAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the merged snapshot once every part of `tick` has arrived
    pub fn accept(&mut self, tick: u64, part: u16, parts: u16, snapshot: Snapshot) -> Option<Snapshot> {
        if part >= parts {
            warn!("Ignoring snapshot part {} of {} for tick {}", part, parts, tick);
            return None;
        }

        match self.tick {
            Some(current) if tick < current => {
                debug!("Dropping part of stale tick {}", tick);
                return None;
            }
            Some(current) if tick == current && parts == self.parts => {}
            _ => {
                if !self.received.is_empty() {
                    debug!(
                        "Abandoning tick {:?} with {} of {} parts",
                        self.tick,
                        self.received.len(),
                        self.parts
                    );
                }
                self.tick = Some(tick);
                self.parts = parts;
                self.received.clear();
            }
        }

        self.received.insert(part, snapshot);
        if self.received.len() < usize::from(parts) {
            return None;
        }

        let pieces = std::mem::take(&mut self.received);
        Some(Snapshot::merge(pieces.into_values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PlayerSnapshot, Point, SNAPSHOT_PART_BUDGET};

    fn crowded(players: u32, segments: usize) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for id in 1..=players {
            snapshot.players.insert(
                id,
                PlayerSnapshot {
                    id,
                    name: format!("p{}", id),
                    color: "#96CEB4".to_string(),
                    segments: (0..segments).map(|i| Point::new(i as f32, 0.0)).collect(),
                    score: 0,
                    alive: true,
                },
            );
        }
        snapshot
    }

    #[test]
    fn test_single_part_passes_straight_through() {
        let mut assembler = SnapshotAssembler::new();
        let snapshot = crowded(2, 5);

        assert_eq!(assembler.accept(1, 0, 1, snapshot.clone()), Some(snapshot));
    }

    #[test]
    fn test_parts_in_any_order_merge() {
        let snapshot = crowded(16, 600);
        let pieces = snapshot.split(SNAPSHOT_PART_BUDGET).unwrap();
        let parts = pieces.len() as u16;
        assert!(parts > 1);

        let mut assembler = SnapshotAssembler::new();
        let mut result = None;
        for (part, piece) in (0..parts).zip(pieces).rev() {
            assert!(result.is_none());
            result = assembler.accept(7, part, parts, piece);
        }

        assert_eq!(result, Some(snapshot));
    }

    #[test]
    fn test_newer_tick_abandons_incomplete_one() {
        let mut assembler = SnapshotAssembler::new();

        assert_eq!(assembler.accept(3, 0, 2, crowded(1, 1)), None);
        assert_eq!(assembler.accept(4, 0, 2, crowded(2, 1)), None);
        // The missing half of tick 3 is no use anymore
        assert_eq!(assembler.accept(3, 1, 2, crowded(1, 1)), None);

        let done = assembler.accept(4, 1, 2, Snapshot::default()).unwrap();
        assert_eq!(done.players.len(), 2);
    }

    #[test]
    fn test_invalid_part_index_is_ignored() {
        let mut assembler = SnapshotAssembler::new();
        assert_eq!(assembler.accept(1, 2, 2, Snapshot::default()), None);
        assert_eq!(assembler.accept(1, 0, 0, Snapshot::default()), None);
    }
}
