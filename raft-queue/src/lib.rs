//! Leader-side replication queue for a Raft-style consensus module.
//!
//! A [`PeerMessageQueue`] is the in-memory staging buffer a leader uses to:
//!
//! - accept log operations proposed locally ([`PeerMessageQueue::append_operation`]),
//! - serve per-follower replication batches paced to each follower's
//!   progress ([`PeerMessageQueue::request_for_peer`]),
//! - aggregate follower acknowledgments into the committed index
//!   ([`PeerMessageQueue::response_from_peer`]),
//! - bound memory usage with per-queue and process-wide soft/hard limits
//!   ([`MemAccountant`]), trimming already-acknowledged entries under
//!   pressure.
//!
//! The queue owns none of its collaborators: the durable log, the RPC
//! transport, per-peer workers, and the consensus state machine all live
//! outside. The queue only triggers them, through return values and the
//! [`QueueObserver`] callbacks.
//!
//! The queue is a shared mutable structure accessed by parallel threads:
//! proposers, one worker per tracked follower, and the consensus module.
//! All state is guarded by a single internal mutex; no operation blocks
//! on I/O.

mod buffer;
mod op_id;
mod replicate_op;
mod tracker;

pub mod accounting;
pub mod config;
pub mod error;
pub mod message;
pub mod observer;
pub mod queue;

pub use crate::accounting::Admit;
pub use crate::accounting::LimitBreach;
pub use crate::accounting::MemAccountant;
pub use crate::config::ConfigError;
pub use crate::config::QueueConfig;
pub use crate::error::DuplicatePeer;
pub use crate::error::ServiceUnavailable;
pub use crate::error::UnknownPeer;
pub use crate::message::ReplicateRequest;
pub use crate::message::ReplicateResponse;
pub use crate::message::ResponseStatus;
pub use crate::observer::QueueObserver;
pub use crate::op_id::OpId;
pub use crate::queue::PeerMessageQueue;
pub use crate::replicate_op::ReplicateOp;
