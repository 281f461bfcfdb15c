use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ean_generator::api::{configure, AppState};
use ean_generator::config::{AppConfig, StoreKind};
use ean_generator::cursor_store::{CursorStore, InMemoryCursorStore};
use ean_generator::metrics::Metrics;
use ean_generator::prefix_rule_manager::{InMemoryPrefixRuleManager, PrefixRuleManager};
use ean_generator::redis_cursor_store::RedisCursorStore;
use ean_generator::redis_prefix_rule_manager::RedisPrefixRuleManager;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ean_generator=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;

    let (prefix_rules, cursors): (Arc<dyn PrefixRuleManager>, Arc<dyn CursorStore>) = match config.store {
        StoreKind::Redis => {
            tracing::info!(redis_url = %config.redis_url, "Using Redis store");
            (
                Arc::new(RedisPrefixRuleManager::new(&config.redis_url)?),
                Arc::new(RedisCursorStore::new(&config.redis_url)?),
            )
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; sequences are lost on restart");
            (
                Arc::new(InMemoryPrefixRuleManager::new()),
                Arc::new(InMemoryCursorStore::new()),
            )
        }
    };

    let state = web::Data::new(AppState::new(
        prefix_rules,
        cursors,
        Metrics::new()?,
        config.max_cas_attempts,
    ));

    tracing::info!(host = %config.host, port = config.port, "Starting HTTP server");

    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind((config.host.as_str(), config.port))?
        .run()
        .await?;

    Ok(())
}
