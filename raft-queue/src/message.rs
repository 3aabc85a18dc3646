//! Wire-shaped request and response types exchanged with followers.
//!
//! The queue builds requests and interprets responses; serializing them
//! onto the transport is the per-peer worker's concern. Ops travel as
//! shared handles so the transport serializes payloads without copying
//! them and without holding the queue lock.

use std::fmt;
use std::sync::Arc;

use anyerror::AnyError;

use crate::OpId;
use crate::ReplicateOp;

/// A batch of operations for one peer, built by
/// [`PeerMessageQueue::request_for_peer`](crate::PeerMessageQueue::request_for_peer).
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ReplicateRequest {
    /// The term of the leader this queue serves.
    pub caller_term: u64,

    /// The leader's committed index at build time.
    pub committed_index: OpId,

    /// Id of the operation immediately before `ops[0]`, or the peer's
    /// last received op when the batch is empty. The follower checks it
    /// against its own log (log-matching property).
    pub preceding_id: OpId,

    /// Operations in strictly increasing `(term, index)` order.
    pub ops: Vec<Arc<ReplicateOp>>,
}

impl ReplicateRequest {
    /// Total accounted size of the contained ops.
    pub fn ops_size_bytes(&self) -> u64 {
        self.ops.iter().map(|op| op.size_bytes()).sum()
    }
}

impl fmt::Display for ReplicateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "term={}, committed={}, preceding={}, ops=",
            self.caller_term, self.committed_index, self.preceding_id
        )?;
        match (self.ops.first(), self.ops.last()) {
            (Some(first), Some(last)) => {
                write!(f, "{}x[{}, {}]", self.ops.len(), first.id, last.id)
            }
            _ => write!(f, "0"),
        }
    }
}

/// A follower's reply to a [`ReplicateRequest`].
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ReplicateResponse {
    pub responder_uuid: String,
    pub responder_term: u64,
    pub status: ResponseStatus,
}

impl ReplicateResponse {
    pub fn success(uuid: impl Into<String>, term: u64, last_received: OpId) -> Self {
        Self {
            responder_uuid: uuid.into(),
            responder_term: term,
            status: ResponseStatus::Success { last_received },
        }
    }

    pub fn preceding_entry_mismatch(
        uuid: impl Into<String>,
        term: u64,
        last_received: OpId,
        detail: AnyError,
    ) -> Self {
        Self {
            responder_uuid: uuid.into(),
            responder_term: term,
            status: ResponseStatus::PrecedingEntryMismatch {
                last_received,
                detail,
            },
        }
    }
}

impl fmt::Display for ReplicateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "from={}, term={}, {}",
            self.responder_uuid, self.responder_term, self.status
        )
    }
}

/// Outcome the follower reported for a request.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ResponseStatus {
    /// The follower accepted the batch; `last_received` is the last op
    /// in its log.
    Success { last_received: OpId },

    /// The request's `preceding_id` does not match the follower's log;
    /// `last_received` is where the follower actually is.
    PrecedingEntryMismatch {
        last_received: OpId,
        detail: AnyError,
    },
}

impl ResponseStatus {
    pub fn last_received(&self) -> OpId {
        match self {
            ResponseStatus::Success { last_received } => *last_received,
            ResponseStatus::PrecedingEntryMismatch { last_received, .. } => *last_received,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Success { last_received } => {
                write!(f, "Success(last_received={})", last_received)
            }
            ResponseStatus::PrecedingEntryMismatch {
                last_received,
                detail,
            } => {
                write!(
                    f,
                    "PrecedingEntryMismatch(last_received={}, {})",
                    last_received, detail
                )
            }
        }
    }
}
