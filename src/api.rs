use actix_web::dev::Payload;
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::{header, StatusCode};
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::{ready, Ready};
use std::sync::Arc;
use thiserror::Error;

use crate::cursor_store::{cursor_key, CursorStore};
use crate::ean::{is_valid_ean13, BaseCode};
use crate::error::{PersistenceError, SequenceGeneratorError, ValidationError};
use crate::export::{export_file_name, to_plain_text};
use crate::metrics::Metrics;
use crate::prefix_rule::{validate_rule_name, PrefixRule};
use crate::prefix_rule_manager::PrefixRuleManager;
use crate::sequence_generator::{BatchReport, SequenceGenerator};

pub const USER_HEADER: &str = "X-User-Id";
const MAX_USER_ID_LEN: usize = 128;

pub struct AppState {
    pub prefix_rules: Arc<dyn PrefixRuleManager>,
    pub cursors: Arc<dyn CursorStore>,
    pub sequence_generator: SequenceGenerator,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        prefix_rules: Arc<dyn PrefixRuleManager>,
        cursors: Arc<dyn CursorStore>,
        metrics: Metrics,
        max_attempts: u32,
    ) -> Self {
        AppState {
            prefix_rules,
            sequence_generator: SequenceGenerator::new(cursors.clone(), metrics.clone(), max_attempts),
            cursors,
            metrics,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing or invalid {} header", USER_HEADER)]
    Unauthorized,

    #[error("base {0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Generator(#[from] SequenceGeneratorError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_)
            | ApiError::Validation(_)
            | ApiError::Generator(SequenceGeneratorError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Persistence(_) | ApiError::Generator(SequenceGeneratorError::Persistence(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Generator(SequenceGeneratorError::ConcurrentModification { .. }) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

/// Caller identity, set by the authenticating gateway in front of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl FromRequest for UserId {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= MAX_USER_ID_LEN)
            .map(|value| UserId(value.to_string()));
        ready(user.ok_or(ApiError::Unauthorized))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BasePayload {
    prefix: String,
    identifier: String,
    #[serde(default)]
    initial_tail: u16,
}

#[derive(Debug, Deserialize)]
struct RuleBatchPayload {
    quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreeFormBatchPayload {
    quantity: u32,
    base_code: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ExportFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    #[serde(default)]
    format: ExportFormat,
}

#[derive(Debug, Serialize)]
struct ValidationResponse {
    code: String,
    valid: bool,
}

async fn register_base(
    user: UserId,
    name: web::Path<String>,
    payload: web::Json<BasePayload>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let rule = PrefixRule::new(name.into_inner(), payload.prefix, payload.identifier, payload.initial_tail)?;
    state.prefix_rules.register_prefix_rule(&user.0, rule.clone()).await?;
    tracing::info!(user = %user.0, base = %rule.name, head = %rule.head(), "Base registered");
    Ok(HttpResponse::Ok().json(rule))
}

async fn list_bases(user: UserId, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let rules = state.prefix_rules.list_prefix_rules(&user.0).await?;
    Ok(HttpResponse::Ok().json(rules))
}

async fn load_rule(state: &AppState, user: &UserId, name: &str) -> Result<PrefixRule, ApiError> {
    validate_rule_name(name)?;
    state
        .prefix_rules
        .get_prefix_rule(&user.0, name)
        .await?
        .ok_or_else(|| ApiError::NotFound(name.to_string()))
}

async fn get_base(
    user: UserId,
    name: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let rule = load_rule(&state, &user, &name).await?;
    Ok(HttpResponse::Ok().json(rule))
}

async fn delete_base(
    user: UserId,
    name: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let name = name.into_inner();
    validate_rule_name(&name)?;
    if !state.prefix_rules.delete_prefix_rule(&user.0, &name).await? {
        return Err(ApiError::NotFound(name));
    }
    state.cursors.delete(&cursor_key(&user.0, &name)).await?;
    tracing::info!(user = %user.0, base = %name, "Base deleted");
    Ok(HttpResponse::NoContent().finish())
}

async fn generate_for_base(
    user: UserId,
    name: web::Path<String>,
    query: web::Query<ExportQuery>,
    payload: web::Json<RuleBatchPayload>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let rule = load_rule(&state, &user, &name).await?;
    let report = state
        .sequence_generator
        .generate_for_rule(&user.0, &rule, payload.quantity)
        .await?;
    Ok(batch_response(report, query.format))
}

async fn generate_free_form(
    user: UserId,
    query: web::Query<ExportQuery>,
    payload: web::Json<FreeFormBatchPayload>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let seed = payload.base_code.as_deref().map(BaseCode::parse).transpose()?;
    let report = state
        .sequence_generator
        .generate_free_form(&user.0, seed, payload.quantity)
        .await?;
    Ok(batch_response(report, query.format))
}

async fn validate_code(_user: UserId, code: web::Path<String>) -> HttpResponse {
    let code = code.into_inner();
    let valid = is_valid_ean13(&code);
    HttpResponse::Ok().json(ValidationResponse { code, valid })
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn metrics(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

fn batch_response(report: BatchReport, format: ExportFormat) -> HttpResponse {
    if let Some(warning) = &report.warning {
        tracing::warn!(batch_id = %report.batch_id, warning = %warning, "Returning unsaved batch");
    }
    match format {
        ExportFormat::Json => HttpResponse::Ok().json(report),
        ExportFormat::Text => {
            let mut response = HttpResponse::Ok();
            response
                .content_type("text/plain; charset=utf-8")
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export_file_name(chrono::Utc::now())),
                ))
                .insert_header(("X-Next-Base", report.next_base.to_string()))
                .insert_header(("X-Cursor-Saved", report.cursor_saved.to_string()));
            if let Some(warning) = &report.warning {
                let printable: String = warning
                    .chars()
                    .filter(|c| c.is_ascii() && !c.is_ascii_control())
                    .collect();
                response.insert_header(("X-Warning", printable));
            }
            response.body(to_plain_text(&report.codes))
        }
    }
}

/// Extractor rejections answer with the same `{ "error": ... }` body as handler errors.
fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics))
        .service(
            web::scope("/api")
                .route("/bases", web::get().to(list_bases))
                .route("/bases/{name}", web::put().to(register_base))
                .route("/bases/{name}", web::get().to(get_base))
                .route("/bases/{name}", web::delete().to(delete_base))
                .route("/bases/{name}/batches", web::post().to(generate_for_base))
                .route("/batches", web::post().to(generate_free_form))
                .route("/ean/{code}/validate", web::get().to(validate_code)),
        );
}
