// OmniCard View - REST API
// JSON endpoints over the read-only catalog

use crate::catalog::{parse_flag, CardRecord, CatalogStore};
use crate::filter::{CategoryFilter, FilterSpec};
use crate::intent::{IntentRule, IntentTranslator};
use crate::matcher;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared application state. The catalog never changes after startup, so no lock.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogStore>,
    pub translator: Arc<IntentTranslator>,
    pub summary_length: usize,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    cards: usize,
    source: Option<String>,
    loaded_at: DateTime<Utc>,
}

/// Card response (display-ready fields)
#[derive(Serialize)]
struct CardResponse {
    institution_name: String,
    product_name: String,
    reward_type: String,
    rewards_summary: String,
    annual_fee: String,
    apply_url: String,
    is_student: Option<bool>,
    accepts_itin: Option<bool>,
}

impl CardResponse {
    fn from_record(card: &CardRecord, summary_length: usize) -> Self {
        Self {
            institution_name: card.institution().to_string(),
            product_name: card.product().to_string(),
            reward_type: card.reward_type_label().to_string(),
            rewards_summary: card.rewards_summary(summary_length),
            annual_fee: card.fee_display().to_string(),
            apply_url: card.apply_url(),
            is_student: card.is_student,
            accepts_itin: card.accepts_itin,
        }
    }
}

#[derive(Serialize)]
struct SearchResponse {
    spec: FilterSpec,
    count: usize,
    cards: Vec<CardResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fired_rules: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CardQuery {
    pub text: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_query_flag")]
    pub zero_fee: Option<bool>,
}

/// Same spellings as the catalog's flag columns (`true`, `1`, `False`, ...)
fn deserialize_query_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| {
        parse_flag(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid flag value '{}'", value)))
    })
    .transpose()
}

impl CardQuery {
    /// Absent parameters fall back to the identity spec
    pub fn to_spec(&self) -> FilterSpec {
        FilterSpec {
            text_term: self.text.clone().unwrap_or_default(),
            category: self
                .category
                .as_deref()
                .map(CategoryFilter::from_label)
                .unwrap_or_default(),
            zero_fee_only: self.zero_fee.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IntentQuery {
    #[serde(default)]
    pub q: String,
}

fn search(state: &AppState, spec: FilterSpec, fired_rules: Vec<String>) -> SearchResponse {
    let cards: Vec<CardResponse> = matcher::filter_records(&spec, state.catalog.records())
        .into_iter()
        .map(|card| CardResponse::from_record(card, state.summary_length))
        .collect();

    SearchResponse {
        spec,
        count: cards.len(),
        cards,
        fired_rules,
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "OK",
        cards: state.catalog.len(),
        source: state.catalog.source().map(str::to_string),
        loaded_at: state.catalog.loaded_at(),
    }))
}

/// GET /api/cards - Structured filter
async fn get_cards(
    State(state): State<AppState>,
    Query(query): Query<CardQuery>,
) -> impl IntoResponse {
    let spec = query.to_spec();
    let response = search(&state, spec, Vec::new());
    info!(spec = %response.spec.summary(), count = response.count, "structured search");

    Json(ApiResponse::ok(response))
}

/// GET /api/intent?q= - Free-text intent query
async fn get_intent(
    State(state): State<AppState>,
    Query(query): Query<IntentQuery>,
) -> impl IntoResponse {
    let result = state.translator.explain(&query.q);
    let response = search(&state, result.spec, result.fired);
    info!(query = %query.q, count = response.count, "intent search");

    Json(ApiResponse::ok(response))
}

/// GET /api/categories - Distinct reward types
async fn get_categories(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.catalog.reward_types()))
}

/// GET /api/rules - Active intent rule table, in evaluation order
async fn get_rules(State(state): State<AppState>) -> impl IntoResponse {
    let rules: Vec<IntentRule> = state.translator.rules().to_vec();
    Json(ApiResponse::ok(rules))
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/cards", get(get_cards))
        .route("/intent", get(get_intent))
        .route("/categories", get(get_categories))
        .route("/rules", get(get_rules))
        .with_state(state);

    Router::new().nest("/api", api_routes)
}
