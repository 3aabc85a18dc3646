//! The queue coordinator: the public facade over buffer, tracker and
//! accountant.


use std::error::Error;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use validit::less_equal;
use validit::Valid;
use validit::Validate;

use crate::accounting::Admit;
use crate::accounting::MemAccountant;
use crate::buffer::OpBuffer;
use crate::config::QueueConfig;
use crate::error::DuplicatePeer;
use crate::error::ServiceUnavailable;
use crate::error::UnknownPeer;
use crate::message::ReplicateRequest;
use crate::message::ReplicateResponse;
use crate::message::ResponseStatus;
use crate::observer::QueueObserver;
use crate::tracker::PeerTracker;
use crate::OpId;
use crate::ReplicateOp;

/// Label of the per-queue accountant level.
const QUEUE_ACCOUNTANT_LABEL: &str = "replication-queue";

/// The leader-side replication queue.
///
/// Proposers stage operations with [`append_operation`], one worker per
/// tracked follower drives [`request_for_peer`] / [`response_from_peer`]
/// cycles, and the enclosing consensus module is notified through a
/// [`QueueObserver`] when the committed index advances or a higher term
/// is observed.
///
/// All state is guarded by a single internal mutex; operations are short
/// (byte accounting, index arithmetic, a bounded batch copy) and never
/// block on I/O. Observer callbacks run after the mutex is released.
///
/// [`append_operation`]: PeerMessageQueue::append_operation
/// [`request_for_peer`]: PeerMessageQueue::request_for_peer
/// [`response_from_peer`]: PeerMessageQueue::response_from_peer
pub struct PeerMessageQueue {
    inner: Mutex<Valid<Inner>>,
    accountant: Arc<MemAccountant>,
    observer: Arc<dyn QueueObserver>,
    max_batch_size_bytes: u64,
}

struct Inner {
    /// `Some` once `init` ran.
    state: Option<QueueState>,
}

impl Validate for Inner {
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        state.buffer.validate()?;
        less_equal!(state.buffer.preceding_id().index, state.committed.index);
        less_equal!(state.committed.index, state.buffer.last_id().index);
        Ok(())
    }
}

struct QueueState {
    /// The term of the leader this queue serves. The queue never changes
    /// it; a higher term observed in a response is only reported.
    current_term: u64,

    /// Number of tracked-peer acknowledgments that commit an index.
    majority_size: usize,

    /// Highest id known replicated on a majority. Monotonic.
    committed: OpId,

    /// The op preceding the first one this queue ever buffers; fresh
    /// peer cursors start here.
    init_preceding: OpId,

    buffer: OpBuffer,
    tracker: PeerTracker,
}

impl QueueState {
    /// Recompute the committed index from peer acknowledgments.
    ///
    /// The candidate is the highest index acknowledged by
    /// `majority_size` tracked peers; the committed id takes the term
    /// recorded in the buffer at that index. Never regresses.
    fn advance_committed(&mut self) -> Option<OpId> {
        let candidate = self.tracker.quorum_acked_index(self.majority_size)?;
        if candidate <= self.committed.index {
            return None;
        }
        let Some(term) = self.buffer.term_at(candidate) else {
            tracing::warn!(
                candidate,
                buffer = display(&self.buffer),
                "quorum index not found in buffer; holding committed index"
            );
            return None;
        };

        self.committed = OpId::new(term, candidate);
        tracing::debug!(committed = display(self.committed), "committed index advanced");
        Some(self.committed)
    }

    /// Drop buffered ops every tracked peer has acknowledged, releasing
    /// their bytes. With no tracked peers nothing is evictable.
    fn trim_acked(&mut self, accountant: &MemAccountant) {
        let Some(lo) = self.tracker.min_acked_index() else {
            return;
        };
        let freed = self.buffer.trim_upto(lo);
        if freed > 0 {
            accountant.release(freed);
            tracing::debug!(
                upto = lo,
                freed,
                buffer = display(&self.buffer),
                "trimmed acknowledged prefix"
            );
        }
    }
}

impl PeerMessageQueue {
    /// Create a queue with limits from `config`, accounting entry memory
    /// against `parent` (the process-wide pool) in addition to its own
    /// limits when one is given.
    pub fn new(
        config: QueueConfig,
        observer: Arc<dyn QueueObserver>,
        parent: Option<Arc<MemAccountant>>,
    ) -> Self {
        let accountant = match parent {
            Some(p) => MemAccountant::with_parent(
                QUEUE_ACCOUNTANT_LABEL,
                config.local_soft_limit_bytes,
                config.local_hard_limit_bytes,
                p,
            ),
            None => MemAccountant::new(
                QUEUE_ACCOUNTANT_LABEL,
                config.local_soft_limit_bytes,
                config.local_hard_limit_bytes,
            ),
        };

        Self {
            inner: Mutex::new(Valid::new(Inner { state: None })),
            accountant: Arc::new(accountant),
            observer,
            max_batch_size_bytes: config.max_batch_size_bytes,
        }
    }

    /// Initialize the queue: the id of the op preceding anything it will
    /// buffer, the leader's term, and the number of tracked-peer acks
    /// that commit an index.
    ///
    /// Must be called exactly once, before any other operation; misuse
    /// panics.
    pub fn init(&self, preceding: OpId, current_term: u64, majority_size: usize) {
        let mut inner = self.lock();
        assert!(
            inner.state.is_none(),
            "PeerMessageQueue::init must be called exactly once"
        );
        inner.state = Some(QueueState {
            current_term,
            majority_size,
            committed: preceding,
            init_preceding: preceding,
            buffer: OpBuffer::new(preceding),
            tracker: PeerTracker::default(),
        });
        tracing::info!(
            preceding = display(preceding),
            term = current_term,
            majority_size,
            "queue initialized"
        );
    }

    /// Stage `op` for replication.
    ///
    /// Admission control may trim the already-acknowledged prefix to
    /// make room. Returns [`ServiceUnavailable`] when a hard limit still
    /// refuses the op; nothing is buffered or charged in that case.
    #[tracing::instrument(level = "debug", skip_all, fields(op = %op.id))]
    pub fn append_operation(&self, op: ReplicateOp) -> Result<(), ServiceUnavailable> {
        let mut inner = self.lock();
        let state = inner.state_mut();

        let op = Arc::new(op);
        let sz = op.size_bytes();

        match self.accountant.try_consume(sz) {
            Admit::Granted => {}
            Admit::SoftLimit(_) | Admit::HardLimit(_) => {
                state.trim_acked(&self.accountant);

                match self.accountant.try_consume(sz) {
                    Admit::Granted => {}
                    Admit::SoftLimit(breach) => {
                        // A soft breach alone never refuses: no hard limit
                        // would be crossed, so charge and admit.
                        tracing::debug!(breach = display(&breach), "admitting past a soft limit");
                        self.accountant.consume(sz);
                    }
                    Admit::HardLimit(breach) => {
                        if breach.is_local && state.buffer.is_empty() {
                            // A drained queue accepts a single op of any
                            // size; only the process-wide pool can refuse
                            // it.
                            tracing::info!(
                                breach = display(&breach),
                                "admitting oversized op into empty queue"
                            );
                            self.accountant.consume(sz);
                        } else {
                            tracing::info!(breach = display(&breach), "append refused");
                            return Err(ServiceUnavailable { breach });
                        }
                    }
                }
            }
        }

        state.buffer.append(op);
        Ok(())
    }

    /// Start replicating to `uuid`.
    ///
    /// The peer's cursor starts at the queue's initial preceding op,
    /// unsynced: requests carry no ops until the first response reveals
    /// the follower's actual position.
    pub fn track_peer(&self, uuid: &str) -> Result<(), DuplicatePeer> {
        let mut inner = self.lock();
        let state = inner.state_mut();

        let at = state.init_preceding;
        state.tracker.track(uuid, at)?;
        tracing::info!(peer = uuid, cursor = display(at), "tracking peer");
        Ok(())
    }

    /// Stop replicating to `uuid` and recompute the commit quorum over
    /// the remaining peers.
    pub fn untrack_peer(&self, uuid: &str) -> Result<(), UnknownPeer> {
        let mut inner = self.lock();
        let state = inner.state_mut();

        state.tracker.untrack(uuid)?;
        tracing::info!(peer = uuid, "untracked peer");

        let advanced = state.advance_committed();
        drop(inner);

        if let Some(committed) = advanced {
            self.observer.on_committed_index_advanced(committed);
        }
        Ok(())
    }

    /// Build the next batch for `uuid`.
    ///
    /// Ops after the peer's cursor are included in increasing id order
    /// until the batch budget is reached; the first eligible op is
    /// always included, whatever its size. An unsynced peer gets an
    /// empty probe request.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn request_for_peer(&self, uuid: &str) -> Result<ReplicateRequest, UnknownPeer> {
        let inner = self.lock();
        let state = inner.state();

        let Some(cursor) = state.tracker.cursor(uuid) else {
            return Err(UnknownPeer {
                uuid: uuid.to_string(),
            });
        };

        let mut request = ReplicateRequest {
            caller_term: state.current_term,
            committed_index: state.committed,
            preceding_id: cursor.last_received(),
            ops: Vec::new(),
        };

        if !cursor.synced() {
            // Probe request: discover whether the follower agrees on
            // `preceding_id` before shipping real batches.
            tracing::debug!(peer = uuid, request = display(&request), "built probe request");
            return Ok(request);
        }

        match state.buffer.iter_from(cursor.last_received().index) {
            None => {
                tracing::warn!(
                    peer = uuid,
                    cursor = display(cursor.last_received()),
                    buffer = display(&state.buffer),
                    "peer cursor is below the trimmed prefix; returning an empty request"
                );
            }
            Some(ops) => {
                let mut batched = 0u64;
                for op in ops {
                    let sz = op.size_bytes();
                    if !request.ops.is_empty() && batched + sz > self.max_batch_size_bytes {
                        break;
                    }
                    batched += sz;
                    request.ops.push(op.clone());
                }
            }
        }

        tracing::debug!(peer = uuid, request = display(&request), "built request");
        Ok(request)
    }

    /// Process a follower's response.
    ///
    /// Updates the peer cursor, recomputes the committed index, and
    /// trims the acknowledged prefix when a soft limit is exceeded.
    /// Returns whether the queue still holds operations for this peer;
    /// the per-peer worker uses it to decide on another request.
    ///
    /// A response from an untracked peer is ignored. A response carrying
    /// a term above the queue's is reported to the observer and not
    /// applied.
    #[tracing::instrument(level = "debug", skip_all, fields(peer = response.responder_uuid.as_str()))]
    pub fn response_from_peer(&self, response: &ReplicateResponse) -> bool {
        let mut inner = self.lock();
        let state = inner.state_mut();

        if state.tracker.cursor(&response.responder_uuid).is_none() {
            tracing::warn!(
                response = display(response),
                "response from untracked peer; ignoring"
            );
            return false;
        }

        if response.responder_term > state.current_term {
            tracing::info!(
                term = response.responder_term,
                current_term = state.current_term,
                "response carries a higher term"
            );
            drop(inner);
            self.observer
                .on_higher_term_observed(&response.responder_uuid, response.responder_term);
            return false;
        }

        let reported = response.status.last_received();

        if let ResponseStatus::PrecedingEntryMismatch { detail, .. } = &response.status {
            tracing::info!(
                reported = display(reported),
                detail = display(detail),
                "preceding entry mismatch; re-pointing cursor"
            );
        }

        if let Some(cursor) = state.tracker.cursor_mut(&response.responder_uuid) {
            cursor.update_received(reported);
        }

        let more_pending = match (&response.status, state.buffer.last_entry_id()) {
            (_, None) => false,
            (ResponseStatus::Success { .. }, Some(last)) => reported.index < last.index,
            // After a mismatch the follower must be re-sent everything at
            // or after the position it reported.
            (ResponseStatus::PrecedingEntryMismatch { .. }, Some(last)) => {
                last.index >= reported.index
            }
        };

        let advanced = state.advance_committed();

        if self.accountant.soft_exceeded() {
            state.trim_acked(&self.accountant);
        }

        drop(inner);
        if let Some(committed) = advanced {
            self.observer.on_committed_index_advanced(committed);
        }

        more_pending
    }

    /// The current committed index.
    pub fn committed_index(&self) -> OpId {
        self.lock().state().committed
    }

    /// Bytes of buffered operations charged to this queue's accountant.
    pub fn queued_bytes(&self) -> u64 {
        self.accountant.consumed()
    }

    /// Number of buffered operations.
    pub fn queued_ops(&self) -> usize {
        self.lock().state().buffer.len()
    }

    /// This queue's accountant level (its parent is the shared pool).
    pub fn accountant(&self) -> &Arc<MemAccountant> {
        &self.accountant
    }

    fn lock(&self) -> MutexGuard<'_, Valid<Inner>> {
        // Recover the guard from a poisoned lock; the Validate impl
        // re-checks the invariants on every access.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn state(&self) -> &QueueState {
        self.state
            .as_ref()
            .expect("PeerMessageQueue used before init()")
    }

    fn state_mut(&mut self) -> &mut QueueState {
        self.state
            .as_mut()
            .expect("PeerMessageQueue used before init()")
    }
}
