pub mod api;
pub mod batch;
pub mod config;
pub mod cursor_store;
pub mod ean;
pub mod error;
pub mod export;
pub mod metrics;
pub mod number_assembler;
pub mod prefix_rule;
pub mod prefix_rule_manager;
pub mod redis_cursor_store;
pub mod redis_prefix_rule_manager;
pub mod sequence_generator;

pub use batch::{generate_batch, Batch, GeneratedCode};
pub use ean::{compute_check_digit, is_valid_ean13, BaseCode};
pub use error::{PersistenceError, SequenceGeneratorError, ValidationError};
pub use prefix_rule::PrefixRule;
pub use sequence_generator::{BatchReport, SequenceGenerator};
