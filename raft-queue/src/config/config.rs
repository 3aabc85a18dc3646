use std::str::FromStr;

use anyerror::AnyError;
use clap::Parser;

use crate::config::error::ConfigError;

/// Parse a human-readable size such as "768KiB" or "2MiB" into bytes.
fn parse_size(src: &str) -> Result<u64, ConfigError> {
    match byte_unit::Byte::from_str(src) {
        Ok(b) => Ok(b.as_u64()),
        Err(e) => Err(ConfigError::InvalidSize {
            invalid: src.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Runtime configuration for a peer message queue.
///
/// Create a configuration, optionally customize fields, validate it, and
/// pass it to [`PeerMessageQueue::new`](crate::PeerMessageQueue::new):
///
/// ```ignore
/// use raft_queue::QueueConfig;
///
/// let config = QueueConfig {
///     max_batch_size_bytes: 512 * 1024,
///     ..Default::default()
/// }
/// .validate()?;
/// ```
///
/// The `local_*` pair bounds the entry cache of one queue; the
/// `global_*` pair sizes the process-wide pool the embedding process
/// constructs and shares across its queues.
#[derive(Clone, Debug, Parser)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct QueueConfig {
    /// Soft cap on the serialized size of one replication batch.
    ///
    /// A single operation larger than the cap is still sent on its own;
    /// the queue never stalls a peer behind an oversized entry.
    #[clap(long, default_value = "1MiB", value_parser=parse_size)]
    pub max_batch_size_bytes: u64,

    /// Soft limit of this queue's entry cache.
    ///
    /// Exceeding it triggers trimming of already-acknowledged entries
    /// but does not by itself refuse admission.
    #[clap(long, default_value = "128MiB", value_parser=parse_size)]
    pub local_soft_limit_bytes: u64,

    /// Hard limit of this queue's entry cache. An append that would
    /// cross it is refused with service-unavailable.
    #[clap(long, default_value = "256MiB", value_parser=parse_size)]
    pub local_hard_limit_bytes: u64,

    /// Soft limit of the process-wide entry cache pool.
    #[clap(long, default_value = "1GiB", value_parser=parse_size)]
    pub global_soft_limit_bytes: u64,

    /// Hard limit of the process-wide entry cache pool.
    #[clap(long, default_value = "2GiB", value_parser=parse_size)]
    pub global_hard_limit_bytes: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        <Self as Parser>::parse_from(Vec::<&'static str>::new())
    }
}

impl QueueConfig {
    /// Build a `QueueConfig` from command-line style arguments.
    ///
    /// The first element of `args` is the program name and is skipped.
    pub fn build(args: &[&str]) -> Result<QueueConfig, ConfigError> {
        let config = <Self as Parser>::try_parse_from(args).map_err(|e| ConfigError::ParseError {
            source: AnyError::from(&e),
            args: args.iter().map(|x| x.to_string()).collect(),
        })?;

        config.validate()
    }

    /// Validate the config, returning it on success.
    pub fn validate(self) -> Result<QueueConfig, ConfigError> {
        if self.max_batch_size_bytes == 0 {
            return Err(ConfigError::MaxBatchSizeIs0);
        }

        if self.local_soft_limit_bytes > self.local_hard_limit_bytes {
            return Err(ConfigError::SoftAboveHard {
                scope: "local".to_string(),
                soft: self.local_soft_limit_bytes,
                hard: self.local_hard_limit_bytes,
            });
        }

        if self.global_soft_limit_bytes > self.global_hard_limit_bytes {
            return Err(ConfigError::SoftAboveHard {
                scope: "global".to_string(),
                soft: self.global_soft_limit_bytes,
                hard: self.global_hard_limit_bytes,
            });
        }

        Ok(self)
    }
}
