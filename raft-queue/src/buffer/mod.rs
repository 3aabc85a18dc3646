//! In-memory staging buffer of replicate operations.

#[cfg(test)]
mod buffer_test;

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use validit::equal;
use validit::less_equal;
use validit::Validate;

use crate::OpId;
use crate::ReplicateOp;

/// Ordered buffer of replicate operations, keyed by ascending index.
///
/// Indices are gap-free and strictly increasing; terms never decrease
/// along the buffer. `preceding` is the id of the operation logically
/// before the first retained entry; it advances as the acknowledged
/// prefix is trimmed, so the trim boundary stays answerable for term
/// lookups and request `preceding_id`s.
#[derive(Debug)]
pub(crate) struct OpBuffer {
    entries: VecDeque<Arc<ReplicateOp>>,
    bytes: u64,
    preceding: OpId,
}

impl fmt::Display for OpBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}], {} ops, {}B",
            self.preceding,
            self.last_id(),
            self.entries.len(),
            self.bytes
        )
    }
}

impl Validate for OpBuffer {
    fn validate(&self) -> Result<(), Box<dyn Error>> {
        equal!(
            self.preceding.index + self.entries.len() as u64,
            self.last_id().index
        );
        less_equal!(self.preceding.term, self.last_id().term);
        Ok(())
    }
}

impl OpBuffer {
    pub(crate) fn new(preceding: OpId) -> Self {
        Self {
            entries: VecDeque::new(),
            bytes: 0,
            preceding,
        }
    }

    /// Append `op` at the tail.
    ///
    /// The caller provides gap-free indices and non-decreasing terms.
    pub(crate) fn append(&mut self, op: Arc<ReplicateOp>) {
        debug_assert_eq!(
            op.id.index,
            self.next_index(),
            "appended index must be gap-free after {}",
            self.last_id()
        );
        debug_assert!(
            op.id.term >= self.last_id().term,
            "terms must not decrease: last {}, appending {}",
            self.last_id(),
            op.id
        );

        self.bytes += op.size_bytes();
        self.entries.push_back(op);
    }

    /// One past the highest appended index.
    pub(crate) fn next_index(&self) -> u64 {
        self.last_id().index + 1
    }

    /// Id of the last entry, falling back to `preceding` when empty.
    pub(crate) fn last_id(&self) -> OpId {
        match self.entries.back() {
            Some(op) => op.id,
            None => self.preceding,
        }
    }

    /// Id of the last retained entry, `None` when the buffer is empty.
    pub(crate) fn last_entry_id(&self) -> Option<OpId> {
        self.entries.back().map(|op| op.id)
    }

    pub(crate) fn preceding_id(&self) -> OpId {
        self.preceding
    }

    /// Term of the entry at `index`, answering for the trim boundary too.
    pub(crate) fn term_at(&self, index: u64) -> Option<u64> {
        if index == self.preceding.index {
            return Some(self.preceding.term);
        }
        if index < self.preceding.index {
            return None;
        }
        let off = (index - self.preceding.index - 1) as usize;
        self.entries.get(off).map(|op| op.id.term)
    }

    /// Iterate entries with index strictly greater than `after`.
    ///
    /// `None` when `after` lies below `preceding`, i.e. the entries right
    /// after `after` were already trimmed away.
    pub(crate) fn iter_from(
        &self,
        after: u64,
    ) -> Option<impl Iterator<Item = &Arc<ReplicateOp>>> {
        if after < self.preceding.index {
            return None;
        }
        let skip = (after - self.preceding.index) as usize;
        Some(self.entries.iter().skip(skip))
    }

    /// Drop the longest prefix whose indices are `<= index`, advancing
    /// `preceding`. Returns the released bytes.
    pub(crate) fn trim_upto(&mut self, index: u64) -> u64 {
        let mut freed = 0u64;
        while let Some(front) = self.entries.front() {
            if front.id.index > index {
                break;
            }
            let sz = front.size_bytes();
            let id = front.id;
            self.entries.pop_front();
            self.preceding = id;
            freed += sz;
        }
        self.bytes -= freed;
        freed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total accounted size of the retained entries.
    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }
}
