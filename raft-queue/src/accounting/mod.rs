//! Hierarchical byte accounting for queue admission control.
//!
//! A [`MemAccountant`] is a node in a chain of byte counters: each queue
//! holds a local accountant whose optional parent is a process-wide pool
//! shared by every queue in the process. [`MemAccountant::try_consume`]
//! walks the chain child-first and either charges every level or none.


use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Verdict of a [`MemAccountant::try_consume`] call.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub enum Admit {
    /// Charged at every level.
    Granted,

    /// No hard limit would be crossed, but some level's soft limit is.
    /// Nothing was charged.
    SoftLimit(LimitBreach),

    /// Some level's hard limit would be crossed. Nothing was charged.
    HardLimit(LimitBreach),
}

/// Which accountant refused a charge, and the numbers behind the refusal.
#[derive(Clone, Debug)]
#[derive(PartialEq, Eq)]
pub struct LimitBreach {
    /// Label of the breaching accountant.
    pub label: String,

    /// True if the breaching accountant is the one the call was made on,
    /// false if it is an ancestor.
    pub is_local: bool,

    /// The limit that refused.
    pub limit: u64,

    /// Bytes consumed at that level when the charge was attempted.
    pub consumed: u64,

    /// Bytes the caller asked for.
    pub requested: u64,
}

impl fmt::Display for LimitBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' at {}B + {}B requested > limit {}B",
            self.label, self.consumed, self.requested, self.limit
        )
    }
}

/// A node in a hierarchy of byte counters, with a soft and a hard limit.
///
/// `try_consume` is atomic across levels: either all levels are charged
/// or none is. Each level is charged with a compare-exchange loop, so
/// sibling accountants sharing a parent serialize at the parent. A
/// refused call rolls its partial charges back; concurrent callers may
/// observe the transient overshoot.
pub struct MemAccountant {
    label: String,
    soft_limit: u64,
    hard_limit: u64,
    consumed: AtomicU64,
    parent: Option<Arc<MemAccountant>>,
}

impl fmt::Display for MemAccountant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}': {}B consumed, soft {}B, hard {}B",
            self.label,
            self.consumed.load(Ordering::Relaxed),
            self.soft_limit,
            self.hard_limit
        )?;
        if let Some(p) = &self.parent {
            write!(f, " <- {}", p)?;
        }
        Ok(())
    }
}

impl MemAccountant {
    pub fn new(label: impl Into<String>, soft_limit: u64, hard_limit: u64) -> Self {
        debug_assert!(soft_limit <= hard_limit);
        Self {
            label: label.into(),
            soft_limit,
            hard_limit,
            consumed: AtomicU64::new(0),
            parent: None,
        }
    }

    pub fn with_parent(
        label: impl Into<String>,
        soft_limit: u64,
        hard_limit: u64,
        parent: Arc<MemAccountant>,
    ) -> Self {
        let mut a = Self::new(label, soft_limit, hard_limit);
        a.parent = Some(parent);
        a
    }

    /// Try to charge `n` bytes at this level and every ancestor.
    ///
    /// If any level's hard limit would be crossed, nothing is charged and
    /// the breach is reported. If every hard limit holds but some level
    /// ends up past its soft limit, nothing is charged either; the caller
    /// decides whether to evict, force the charge with [`Self::consume`],
    /// or give up.
    pub fn try_consume(&self, n: u64) -> Admit {
        let mut soft: Option<LimitBreach> = None;
        let mut charged = 0usize;

        let mut level = Some(self);
        let mut depth = 0usize;
        while let Some(acc) = level {
            match acc.charge(n) {
                Ok(after) => {
                    if after > acc.soft_limit && soft.is_none() {
                        soft = Some(acc.breach(depth == 0, acc.soft_limit, after - n, n));
                    }
                    charged += 1;
                }
                Err(now) => {
                    self.rollback(n, charged);
                    let b = acc.breach(depth == 0, acc.hard_limit, now, n);
                    tracing::debug!(breach = display(&b), "hard limit refused consume");
                    return Admit::HardLimit(b);
                }
            }
            level = acc.parent.as_deref();
            depth += 1;
        }

        if let Some(b) = soft {
            self.rollback(n, charged);
            tracing::debug!(breach = display(&b), "soft limit refused consume");
            return Admit::SoftLimit(b);
        }

        Admit::Granted
    }

    /// Charge `n` bytes at this level and every ancestor, unconditionally.
    ///
    /// Used when an op is admitted despite a soft breach, and for callers
    /// that account memory the limits do not govern.
    pub fn consume(&self, n: u64) {
        let mut level = Some(self);
        while let Some(acc) = level {
            acc.consumed.fetch_add(n, Ordering::Relaxed);
            level = acc.parent.as_deref();
        }
    }

    /// Release `n` bytes at this level and every ancestor.
    pub fn release(&self, n: u64) {
        let mut level = Some(self);
        while let Some(acc) = level {
            acc.sub(n);
            level = acc.parent.as_deref();
        }
    }

    /// True when this level or any ancestor currently sits above its soft
    /// limit.
    pub fn soft_exceeded(&self) -> bool {
        let mut level = Some(self);
        while let Some(acc) = level {
            if acc.consumed.load(Ordering::Relaxed) > acc.soft_limit {
                return true;
            }
            level = acc.parent.as_deref();
        }
        false
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    pub fn soft_limit(&self) -> u64 {
        self.soft_limit
    }

    pub fn hard_limit(&self) -> u64 {
        self.hard_limit
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Charge `n` at this level only. `Err(consumed_now)` if the hard
    /// limit would be crossed, `Ok(consumed_after)` otherwise.
    fn charge(&self, n: u64) -> Result<u64, u64> {
        let mut cur = self.consumed.load(Ordering::Relaxed);
        loop {
            let next = cur + n;
            if next > self.hard_limit {
                return Err(cur);
            }
            match self
                .consumed
                .compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return Ok(next),
                Err(now) => cur = now,
            }
        }
    }

    /// Undo a partial `try_consume`: release `n` from the first `levels`
    /// levels of the chain.
    fn rollback(&self, n: u64, mut levels: usize) {
        let mut level = Some(self);
        while let Some(acc) = level {
            if levels == 0 {
                break;
            }
            acc.sub(n);
            levels -= 1;
            level = acc.parent.as_deref();
        }
    }

    fn sub(&self, n: u64) {
        let prev = self.consumed.fetch_sub(n, Ordering::Relaxed);
        debug_assert!(
            prev >= n,
            "released {}B from '{}' holding only {}B",
            n,
            self.label,
            prev
        );
    }

    fn breach(&self, is_local: bool, limit: u64, consumed: u64, requested: u64) -> LimitBreach {
        LimitBreach {
            label: self.label.clone(),
            is_local,
            limit,
            consumed,
            requested,
        }
    }
}
