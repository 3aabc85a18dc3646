use anyerror::AnyError;

/// Error variants related to configuration.
#[derive(Debug, thiserror::Error)]
#[derive(PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to parse configuration from command-line arguments.
    #[error("ParseError: {source} while parsing ({args:?})")]
    ParseError {
        /// The underlying parse error.
        source: AnyError,
        /// The arguments that failed to parse.
        args: Vec<String>,
    },

    /// The batch budget must admit at least one byte.
    #[error("max_batch_size_bytes must be > 0")]
    MaxBatchSizeIs0,

    /// A soft limit sits above its hard limit.
    #[error("{scope} soft limit ({soft}) must be <= its hard limit ({hard})")]
    SoftAboveHard {
        /// Which limit pair is inconsistent, `local` or `global`.
        scope: String,
        soft: u64,
        hard: u64,
    },

    /// A size string could not be parsed into bytes.
    #[error("invalid size {invalid:?}: {reason}")]
    InvalidSize {
        /// The string that failed to parse.
        invalid: String,
        /// The reason for the parse failure.
        reason: String,
    },
}
