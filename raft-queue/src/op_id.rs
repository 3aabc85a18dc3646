use std::fmt;

/// The identity of a replicate operation.
///
/// A term and an index identify an operation globally. The total order
/// compares the term first, then the index.
#[derive(Debug, Default, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct OpId {
    pub term: u64,
    pub index: u64,
}

impl OpId {
    /// Sentinel marking "nothing yet": no op received, nothing committed.
    pub const MIN: OpId = OpId { term: 0, index: 0 };

    pub fn new(term: u64, index: u64) -> Self {
        OpId { term, index }
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.term, self.index)
    }
}
