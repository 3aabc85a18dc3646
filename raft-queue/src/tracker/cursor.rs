use std::fmt;

use crate::OpId;

/// Replication cursor for one tracked peer.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq)]
pub(crate) struct PeerCursor {
    /// The last operation the follower confirmed it received.
    last_received: OpId,

    /// Whether `last_received` reflects the follower's own report.
    ///
    /// A freshly tracked peer starts unsynced: requests built for it
    /// carry no ops and serve only to discover the follower's position.
    /// The first response, success or log-match refusal, carries the
    /// authoritative position and syncs the cursor.
    synced: bool,
}

impl PeerCursor {
    pub(crate) fn new(last_received: OpId) -> Self {
        Self {
            last_received,
            synced: false,
        }
    }

    pub(crate) fn last_received(&self) -> OpId {
        self.last_received
    }

    pub(crate) fn synced(&self) -> bool {
        self.synced
    }

    /// Absolute update to the position the follower reported.
    ///
    /// Responses may arrive out of order; the report is authoritative
    /// either way, so the cursor may move backward.
    pub(crate) fn update_received(&mut self, id: OpId) {
        tracing::debug!(
            cursor = display(&*self),
            reported = display(id),
            "updating peer cursor"
        );
        self.last_received = id;
        self.synced = true;
    }
}

impl fmt::Display for PeerCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(synced:{})", self.last_received, self.synced)
    }
}
