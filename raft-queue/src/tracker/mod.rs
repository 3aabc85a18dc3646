//! Tracks the replication progress of every follower the leader
//! replicates to.
//!
//! Each tracked peer contributes its acknowledged index to two order
//! statistics: the minimum bounds what the buffer may trim, and the
//! `majority_size`-th highest is the commit candidate.

mod cursor;

#[cfg(test)]
mod tracker_test;

use std::collections::BTreeMap;

pub(crate) use cursor::PeerCursor;

use crate::error::DuplicatePeer;
use crate::error::UnknownPeer;
use crate::OpId;

#[derive(Debug, Default)]
pub(crate) struct PeerTracker {
    peers: BTreeMap<String, PeerCursor>,
}

impl PeerTracker {
    /// Start tracking `uuid` with its cursor at `at`, unsynced.
    pub(crate) fn track(&mut self, uuid: &str, at: OpId) -> Result<(), DuplicatePeer> {
        if self.peers.contains_key(uuid) {
            return Err(DuplicatePeer {
                uuid: uuid.to_string(),
            });
        }
        self.peers.insert(uuid.to_string(), PeerCursor::new(at));
        Ok(())
    }

    pub(crate) fn untrack(&mut self, uuid: &str) -> Result<(), UnknownPeer> {
        match self.peers.remove(uuid) {
            Some(_) => Ok(()),
            None => Err(UnknownPeer {
                uuid: uuid.to_string(),
            }),
        }
    }

    pub(crate) fn cursor(&self, uuid: &str) -> Option<&PeerCursor> {
        self.peers.get(uuid)
    }

    pub(crate) fn cursor_mut(&mut self, uuid: &str) -> Option<&mut PeerCursor> {
        self.peers.get_mut(uuid)
    }

    pub(crate) fn len(&self) -> usize {
        self.peers.len()
    }

    /// Highest index acknowledged by every tracked peer; `None` when no
    /// peer is tracked. Bounds what the buffer may evict.
    pub(crate) fn min_acked_index(&self) -> Option<u64> {
        self.peers.values().map(|c| c.last_received().index).min()
    }

    /// Highest index acknowledged by at least `majority` tracked peers;
    /// `None` when fewer than `majority` peers are tracked.
    pub(crate) fn quorum_acked_index(&self, majority: usize) -> Option<u64> {
        if majority == 0 || self.peers.len() < majority {
            return None;
        }
        let mut acked: Vec<u64> = self.peers.values().map(|c| c.last_received().index).collect();
        acked.sort_unstable_by(|a, b| b.cmp(a));
        Some(acked[majority - 1])
    }
}
