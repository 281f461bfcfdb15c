#[cfg(target_os = "linux")]
use prometheus::process_collector::ProcessCollector;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Counters for the generation path, registered on a private registry so
/// several instances (one per test) never collide.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub batches: IntCounter,
    pub codes_generated: IntCounter,
    pub cursor_write_failures: IntCounter,
    pub cursor_conflicts: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let batches = IntCounter::new("ean_batches_total", "Batches of EAN-13 codes generated")?;
        let codes_generated = IntCounter::new("ean_codes_generated_total", "EAN-13 codes generated")?;
        let cursor_write_failures = IntCounter::new(
            "ean_cursor_write_failures_total",
            "Batches whose cursor could not be saved",
        )?;
        let cursor_conflicts = IntCounter::new(
            "ean_cursor_conflicts_total",
            "Cursor writes lost to a concurrent batch and retried",
        )?;

        registry.register(Box::new(batches.clone()))?;
        registry.register(Box::new(codes_generated.clone()))?;
        registry.register(Box::new(cursor_write_failures.clone()))?;
        registry.register(Box::new(cursor_conflicts.clone()))?;
        #[cfg(target_os = "linux")]
        registry.register(Box::new(ProcessCollector::for_self()))?;

        Ok(Metrics {
            registry,
            batches,
            codes_generated,
            cursor_write_failures,
            cursor_conflicts,
        })
    }

    /// Prometheus text exposition of every registered counter.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
