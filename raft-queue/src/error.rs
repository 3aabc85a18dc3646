//! Error types exposed by this crate.

use crate::accounting::LimitBreach;

/// Admission control refused an append.
///
/// The op was dropped and nothing was charged; the proposer may retry
/// once memory pressure clears.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
#[error("service unavailable: {breach}")]
pub struct ServiceUnavailable {
    /// The limit that refused the final admission attempt.
    pub breach: LimitBreach,
}

/// The peer is already tracked by this queue.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
#[error("peer {uuid} is already tracked")]
pub struct DuplicatePeer {
    pub uuid: String,
}

/// The peer is not tracked by this queue.
#[derive(Debug, Clone, thiserror::Error)]
#[derive(PartialEq, Eq)]
#[error("peer {uuid} is not tracked")]
pub struct UnknownPeer {
    pub uuid: String,
}
