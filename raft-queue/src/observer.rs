use crate::OpId;

/// Callbacks from the queue into the enclosing consensus module.
///
/// The queue invokes these after releasing its internal lock, so an
/// implementation may call back into the queue.
pub trait QueueObserver: Send + Sync {
    /// The committed index advanced to `committed`.
    ///
    /// Monotonic: successive calls carry non-decreasing ids.
    fn on_committed_index_advanced(&self, committed: OpId);

    /// A follower responded with a term greater than the queue's current
    /// term. The queue does not change terms; stepping down is the
    /// consensus module's responsibility.
    fn on_higher_term_observed(&self, peer: &str, term: u64);
}
