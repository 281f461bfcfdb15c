use thiserror::Error;

/// Input rejected before any code is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("quantity must be between {min} and {max}, got {quantity}")]
    QuantityOutOfRange { quantity: u32, min: u32, max: u32 },

    #[error("base code must be exactly 12 digits, got {0:?}")]
    InvalidBaseCode(String),

    #[error("prefix must be exactly 3 digits, got {0:?}")]
    InvalidPrefix(String),

    #[error("identifier must be exactly 5 digits, got {0:?}")]
    InvalidIdentifier(String),

    #[error("sequential tail must be between 0 and 9999, got {0}")]
    InvalidTail(u32),

    #[error("base name must be 1-64 characters of letters, digits, '-' or '_', got {0:?}")]
    InvalidRuleName(String),

    #[error("batch would exceed the largest 12-digit base code {limit}")]
    Overflow { limit: u64 },

    #[error("batch of {quantity} starting at tail {start:04} would exceed tail 9999")]
    TailOverflow { start: u16, quantity: u32 },

    #[error("every tail under {0} has already been issued")]
    TailExhausted(String),

    #[error("base code {seed} is behind the saved sequence, which continues at {cursor}")]
    SeedBehindCursor { seed: String, cursor: String },

    #[error("no base code supplied and no saved sequence to continue from")]
    MissingBaseCode,
}

/// The cursor or rule store could not be read or written.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("stored cursor {key} holds an invalid base code {value:?}")]
    CorruptCursor { key: String, value: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SequenceGeneratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("cursor {key} kept changing under concurrent batches after {attempts} attempts")]
    ConcurrentModification { key: String, attempts: u32 },
}
