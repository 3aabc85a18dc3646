use std::fmt;

use crate::OpId;

/// A replicate operation staged for delivery to followers.
///
/// The payload is opaque to the queue: it is never parsed, only its
/// serialized size is accounted against the memory limits.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ReplicateOp {
    pub id: OpId,
    pub payload: Vec<u8>,
}

impl ReplicateOp {
    pub fn new(id: OpId, payload: Vec<u8>) -> Self {
        ReplicateOp { id, payload }
    }

    /// Bytes this op occupies in the queue, as charged to the accountant
    /// and counted against the batch budget.
    pub fn size_bytes(&self) -> u64 {
        (self.payload.len() + std::mem::size_of::<OpId>()) as u64
    }
}

impl fmt::Display for ReplicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}B)", self.id, self.size_bytes())
    }
}
