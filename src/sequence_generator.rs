use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::batch::{generate_batch, validate_quantity, Batch, GeneratedCode};
use crate::cursor_store::{cursor_key, free_form_cursor_key, CursorStore};
use crate::ean::BaseCode;
use crate::error::{SequenceGeneratorError, ValidationError};
use crate::metrics::Metrics;
use crate::number_assembler::NumberAssembler;
use crate::prefix_rule::PrefixRule;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Outcome of one generation request.
///
/// `cursor_saved == false` means the codes were issued but the sequence was
/// not advanced; `warning` then says so and a later batch may repeat them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub codes: Vec<GeneratedCode>,
    pub next_base: BaseCode,
    pub cursor_saved: bool,
    pub warning: Option<String>,
}

/// Runs read cursor -> generate -> write cursor for one sequence.
///
/// Concurrency Control Strategy:
/// the cursor is only written with a compare-and-set against the value the
/// batch was computed from. A batch that loses the race is thrown away and
/// recomputed from the fresh cursor, so two requests can never both commit
/// overlapping ranges.
pub struct SequenceGenerator {
    cursors: Arc<dyn CursorStore>,
    assembler: NumberAssembler,
    metrics: Metrics,
    max_attempts: u32,
}

impl SequenceGenerator {
    pub fn new(cursors: Arc<dyn CursorStore>, metrics: Metrics, max_attempts: u32) -> Self {
        SequenceGenerator {
            cursors,
            assembler: NumberAssembler::new(),
            metrics,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Next batch under a named base (prefixed identifier mode).
    pub async fn generate_for_rule(
        &self,
        user: &str,
        rule: &PrefixRule,
        quantity: u32,
    ) -> Result<BatchReport, SequenceGeneratorError> {
        validate_quantity(quantity)?;
        rule.validate()?;
        let key = cursor_key(user, &rule.name);
        let assembler = self.assembler;
        self.run(&key, quantity, |cursor| {
            let start = assembler.resolve_start(rule, cursor)?;
            assembler.check_tail_capacity(&start, quantity)?;
            Ok(start)
        })
        .await
    }

    /// Next batch in free-form mode. An explicit `seed` wins over the saved
    /// cursor but may not go back behind it.
    pub async fn generate_free_form(
        &self,
        user: &str,
        seed: Option<BaseCode>,
        quantity: u32,
    ) -> Result<BatchReport, SequenceGeneratorError> {
        validate_quantity(quantity)?;
        let key = free_form_cursor_key(user);
        self.run(&key, quantity, |cursor| match (seed, cursor) {
            (Some(seed), Some(cursor)) if seed < *cursor => Err(ValidationError::SeedBehindCursor {
                seed: seed.to_string(),
                cursor: cursor.to_string(),
            }),
            (Some(seed), _) => Ok(seed),
            (None, Some(cursor)) => Ok(*cursor),
            (None, None) => Err(ValidationError::MissingBaseCode),
        })
        .await
    }

    async fn run<F>(&self, key: &str, quantity: u32, resolve_start: F) -> Result<BatchReport, SequenceGeneratorError>
    where
        F: Fn(Option<&BaseCode>) -> Result<BaseCode, ValidationError> + Send + Sync,
    {
        for attempt in 1..=self.max_attempts {
            let current = self.cursors.get(key).await?;
            let start = resolve_start(current.as_ref())?;
            let batch = generate_batch(start, quantity)?;

            match self
                .cursors
                .compare_and_set(key, current.as_ref(), &batch.next_base)
                .await
            {
                Ok(true) => {
                    tracing::info!(
                        cursor = key,
                        start = %start,
                        next_base = %batch.next_base,
                        quantity,
                        "Batch generated"
                    );
                    return Ok(self.report(batch, true, None));
                }
                Ok(false) => {
                    self.metrics.cursor_conflicts.inc();
                    tracing::debug!(cursor = key, attempt, "Cursor moved during batch, retrying");
                }
                Err(err) => {
                    self.metrics.cursor_write_failures.inc();
                    tracing::warn!(
                        cursor = key,
                        next_base = %batch.next_base,
                        error = %err,
                        "Batch generated but cursor was not saved"
                    );
                    let warning = format!(
                        "codes were generated but the sequence was not saved ({}); \
                         the next batch may repeat these codes",
                        err
                    );
                    return Ok(self.report(batch, false, Some(warning)));
                }
            }
        }

        Err(SequenceGeneratorError::ConcurrentModification {
            key: key.to_string(),
            attempts: self.max_attempts,
        })
    }

    fn report(&self, batch: Batch, cursor_saved: bool, warning: Option<String>) -> BatchReport {
        self.metrics.batches.inc();
        self.metrics.codes_generated.inc_by(batch.codes.len() as u64);
        BatchReport {
            batch_id: Uuid::new_v4(),
            codes: batch.codes,
            next_base: batch.next_base,
            cursor_saved,
            warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor_store::InMemoryCursorStore;
    use crate::error::PersistenceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn code(s: &str) -> BaseCode {
        BaseCode::parse(s).unwrap()
    }

    fn generator(store: Arc<dyn CursorStore>) -> SequenceGenerator {
        SequenceGenerator::new(store, Metrics::new().unwrap(), DEFAULT_MAX_ATTEMPTS)
    }

    fn store_down() -> PersistenceError {
        redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into()
    }

    /// Every read fails.
    struct UnreadableStore;

    #[async_trait]
    impl CursorStore for UnreadableStore {
        async fn get(&self, _key: &str) -> Result<Option<BaseCode>, PersistenceError> {
            Err(store_down())
        }

        async fn compare_and_set(
            &self,
            _key: &str,
            _expected: Option<&BaseCode>,
            _new: &BaseCode,
        ) -> Result<bool, PersistenceError> {
            panic!("nothing may be written after a failed read");
        }

        async fn delete(&self, _key: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    /// Reads work; every write fails.
    struct ReadOnlyStore(InMemoryCursorStore);

    #[async_trait]
    impl CursorStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> Result<Option<BaseCode>, PersistenceError> {
            self.0.get(key).await
        }

        async fn compare_and_set(
            &self,
            _key: &str,
            _expected: Option<&BaseCode>,
            _new: &BaseCode,
        ) -> Result<bool, PersistenceError> {
            Err(store_down())
        }

        async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
            self.0.delete(key).await
        }
    }

    /// Loses the first `conflicts` compare-and-sets, as if another batch won.
    struct ContendedStore {
        inner: InMemoryCursorStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl CursorStore for ContendedStore {
        async fn get(&self, key: &str) -> Result<Option<BaseCode>, PersistenceError> {
            self.inner.get(key).await
        }

        async fn compare_and_set(
            &self,
            key: &str,
            expected: Option<&BaseCode>,
            new: &BaseCode,
        ) -> Result<bool, PersistenceError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Ok(false);
            }
            self.inner.compare_and_set(key, expected, new).await
        }

        async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_rule_batches_continue_the_sequence() {
        let store = Arc::new(InMemoryCursorStore::new());
        let generator = generator(store.clone());
        let rule = PrefixRule::new("main", "789", "12345", 0).unwrap();

        let first = generator.generate_for_rule("alice", &rule, 3).await.unwrap();
        assert!(first.cursor_saved);
        assert_eq!(first.codes[0].base_code, code("789123450000"));
        assert_eq!(first.next_base, code("789123450003"));

        let second = generator.generate_for_rule("alice", &rule, 2).await.unwrap();
        assert_eq!(second.codes[0].base_code, code("789123450003"));
        assert_eq!(
            store.get(&cursor_key("alice", "main")).await.unwrap(),
            Some(code("789123450005"))
        );
    }

    #[tokio::test]
    async fn test_changed_identifier_resets_tail() {
        let store = Arc::new(InMemoryCursorStore::new());
        let generator = generator(store);
        let rule = PrefixRule::new("main", "789", "12345", 0).unwrap();
        generator.generate_for_rule("alice", &rule, 40).await.unwrap();

        let changed = PrefixRule::new("main", "789", "99999", 0).unwrap();
        let report = generator.generate_for_rule("alice", &changed, 1).await.unwrap();
        assert_eq!(report.codes[0].base_code, code("789999990000"));
    }

    #[tokio::test]
    async fn test_tail_overflow_is_rejected_without_touching_cursor() {
        let store = Arc::new(InMemoryCursorStore::new());
        let generator = generator(store.clone());
        let rule = PrefixRule::new("main", "789", "12345", 9995).unwrap();

        let err = generator.generate_for_rule("alice", &rule, 6).await.unwrap_err();
        assert!(matches!(
            err,
            SequenceGeneratorError::Validation(ValidationError::TailOverflow { .. })
        ));
        assert_eq!(store.get(&cursor_key("alice", "main")).await.unwrap(), None);

        let last = generator.generate_for_rule("alice", &rule, 5).await.unwrap();
        assert_eq!(last.codes.last().unwrap().base_code, code("789123459999"));
        let err = generator.generate_for_rule("alice", &rule, 1).await.unwrap_err();
        assert!(matches!(
            err,
            SequenceGeneratorError::Validation(ValidationError::TailExhausted(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_quantity_never_reaches_the_store() {
        let generator = generator(Arc::new(ReadOnlyStore(InMemoryCursorStore::new())));
        for quantity in [0, 1001] {
            let err = generator
                .generate_free_form("alice", Some(code("000000000000")), quantity)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                SequenceGeneratorError::Validation(ValidationError::QuantityOutOfRange { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_free_form_seed_then_cursor() {
        let store = Arc::new(InMemoryCursorStore::new());
        let generator = generator(store);

        let err = generator.generate_free_form("alice", None, 1).await.unwrap_err();
        assert!(matches!(
            err,
            SequenceGeneratorError::Validation(ValidationError::MissingBaseCode)
        ));

        let first = generator
            .generate_free_form("alice", Some(code("000000000000")), 3)
            .await
            .unwrap();
        assert_eq!(first.next_base, code("000000000003"));

        let second = generator.generate_free_form("alice", None, 2).await.unwrap();
        assert_eq!(second.codes[0].base_code, code("000000000003"));

        let err = generator
            .generate_free_form("alice", Some(code("000000000001")), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SequenceGeneratorError::Validation(ValidationError::SeedBehindCursor { .. })
        ));

        let jumped = generator
            .generate_free_form("alice", Some(code("000000000100")), 1)
            .await
            .unwrap();
        assert_eq!(jumped.next_base, code("000000000101"));
    }

    #[tokio::test]
    async fn test_failed_read_produces_no_batch() {
        let metrics = Metrics::new().unwrap();
        let generator = SequenceGenerator::new(Arc::new(UnreadableStore), metrics.clone(), DEFAULT_MAX_ATTEMPTS);

        let err = generator
            .generate_free_form("alice", Some(code("000000000010")), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, SequenceGeneratorError::Persistence(PersistenceError::Redis(_))));

        let rule = PrefixRule::new("main", "789", "12345", 0).unwrap();
        let err = generator.generate_for_rule("alice", &rule, 2).await.unwrap_err();
        assert!(matches!(err, SequenceGeneratorError::Persistence(_)));
        assert_eq!(metrics.batches.get(), 0);
        assert_eq!(metrics.codes_generated.get(), 0);
    }

    #[tokio::test]
    async fn test_last_head_cannot_issue_its_final_tail() {
        let store = Arc::new(InMemoryCursorStore::new());
        let generator = generator(store.clone());
        let rule = PrefixRule::new("top", "999", "99999", 9998).unwrap();

        let err = generator.generate_for_rule("alice", &rule, 2).await.unwrap_err();
        assert!(matches!(
            err,
            SequenceGeneratorError::Validation(ValidationError::Overflow { .. })
        ));
        assert_eq!(store.get(&cursor_key("alice", "top")).await.unwrap(), None);

        let report = generator.generate_for_rule("alice", &rule, 1).await.unwrap();
        assert_eq!(report.codes[0].base_code, code("999999999998"));
        let err = generator.generate_for_rule("alice", &rule, 1).await.unwrap_err();
        assert!(matches!(
            err,
            SequenceGeneratorError::Validation(ValidationError::Overflow { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_write_still_returns_codes_with_warning() {
        let metrics = Metrics::new().unwrap();
        let generator = SequenceGenerator::new(
            Arc::new(ReadOnlyStore(InMemoryCursorStore::new())),
            metrics.clone(),
            DEFAULT_MAX_ATTEMPTS,
        );

        let report = generator
            .generate_free_form("alice", Some(code("000000000010")), 2)
            .await
            .unwrap();
        assert_eq!(report.codes.len(), 2);
        assert!(!report.cursor_saved);
        assert!(report.warning.unwrap().contains("not saved"));
        assert_eq!(metrics.cursor_write_failures.get(), 1);
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_then_give_up() {
        let store = Arc::new(ContendedStore {
            inner: InMemoryCursorStore::new(),
            conflicts: AtomicU32::new(2),
        });
        let generator = generator(store.clone());
        let report = generator
            .generate_free_form("alice", Some(code("000000000000")), 1)
            .await
            .unwrap();
        assert!(report.cursor_saved);

        store.conflicts.store(DEFAULT_MAX_ATTEMPTS, Ordering::SeqCst);
        let err = generator.generate_free_form("alice", None, 1).await.unwrap_err();
        assert!(matches!(
            err,
            SequenceGeneratorError::ConcurrentModification { attempts: 5, .. }
        ));
    }
}
