use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use larder_core::amount::{AmountIssue, CanonicalAmount, parse_amount};
use larder_core::db::Database;
use larder_core::engine::Engine;
use larder_core::ingest::{IngestOutcome, ingest_row};
use larder_core::migration::run_migration;
use larder_core::models::{
    CanonicalIngredient, Classification, IngredientCategory, MigrationReport, NewRawIngredient,
    RecipeIngredientLink, Unit, validate_new_raw_ingredient,
};
use larder_core::name_normalizer::{NormalizedName, normalize_name_detailed};
use larder_core::units::validate_scale_factor;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    engine: Arc<Engine>,
    api_key: Option<String>,
}

// --- Request / Response types ---

/// Amounts arrive either as JSON numbers or as recipe text ("1 1/2", "1,5").
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    fn resolve(self) -> (f64, Vec<AmountIssue>) {
        match self {
            Self::Number(n) => (n, Vec::new()),
            Self::Text(s) => {
                let parsed = parse_amount(&s);
                (parsed.value, parsed.issues)
            }
        }
    }
}

#[derive(Deserialize)]
struct IngestRequest {
    recipe_id: String,
    name: String,
    amount: Option<AmountInput>,
    #[serde(default)]
    unit: String,
    notes: Option<String>,
    #[serde(default)]
    position: i64,
    #[serde(default)]
    optional: bool,
}

#[derive(Serialize)]
struct IngestResponse {
    #[serde(flatten)]
    outcome: IngestOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    amount_issues: Vec<AmountIssue>,
}

#[derive(Deserialize)]
struct CanonicalizeRequest {
    name: Option<String>,
    amount: Option<AmountInput>,
    #[serde(default)]
    unit: String,
}

#[derive(Serialize)]
struct CanonicalizeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<NormalizedName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classification: Option<Classification>,
    amount: CanonicalAmount,
    unit_resolved: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    amount_issues: Vec<AmountIssue>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
struct ScaleQuery {
    scale: Option<f64>,
}

#[derive(Deserialize)]
struct MigrateRequest {
    #[serde(default)]
    dry_run: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let (raw_amount, amount_issues) = req.amount.map_or((0.0, Vec::new()), AmountInput::resolve);
    let raw = NewRawIngredient {
        recipe_id: req.recipe_id,
        raw_name: req.name,
        raw_amount,
        raw_unit: req.unit,
        notes: req.notes,
        position: req.position,
        is_optional: req.optional,
    };

    validate_new_raw_ingredient(&raw).map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    if state.engine.normalize_name(&raw.raw_name).is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Ingredient name '{}' is empty after normalization",
            raw.raw_name
        )));
    }

    let outcome = {
        let db = state
            .db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        ingest_row(&db, &state.engine, &raw).context("failed to ingest row")?
    };

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            outcome,
            amount_issues,
        }),
    ))
}

/// Stateless: nothing is read from or written to the database.
async fn canonicalize(
    State(state): State<AppState>,
    Json(req): Json<CanonicalizeRequest>,
) -> Json<CanonicalizeResponse> {
    let engine = &state.engine;
    let (amount, amount_issues) = req.amount.map_or((0.0, Vec::new()), AmountInput::resolve);
    let canonical = engine.canonicalize(amount, &req.unit);

    let name = req.name.as_deref().map(normalize_name_detailed);
    let category = name
        .as_ref()
        .and_then(|n| engine.classifier().classify(&n.name))
        .map(|c| c.name.clone());
    let classification = name
        .as_ref()
        .filter(|n| !n.is_empty())
        .map(|n| engine.classify(&n.name));

    Json(CanonicalizeResponse {
        name,
        category,
        classification,
        unit_resolved: canonical.is_resolved(),
        amount: canonical,
        amount_issues,
    })
}

async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<CanonicalIngredient>>, ApiError> {
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let ingredients = db
        .list_canonical_ingredients(search)
        .context("database error")?;
    Ok(Json(ingredients))
}

async fn get_ingredient(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CanonicalIngredient>, ApiError> {
    let canonical = state.engine.normalize_name(&name);
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let ingredient = db
        .get_canonical_ingredient_by_name(&canonical)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("Ingredient '{canonical}' not found")))?;
    Ok(Json(ingredient))
}

async fn get_recipe_links(
    State(state): State<AppState>,
    Path(recipe_id): Path<String>,
    Query(query): Query<ScaleQuery>,
) -> Result<Json<Vec<RecipeIngredientLink>>, ApiError> {
    if let Some(factor) = query.scale {
        validate_scale_factor(factor).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let links = db
        .get_links_for_recipe(&recipe_id)
        .context("database error")?;
    let links = match query.scale {
        Some(factor) => links.iter().map(|l| l.scaled(factor)).collect(),
        None => links,
    };
    Ok(Json(links))
}

async fn migrate(
    State(state): State<AppState>,
    Json(req): Json<MigrateRequest>,
) -> Result<Json<MigrationReport>, ApiError> {
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let report = run_migration(&db, &state.engine, req.dry_run).context("migration failed")?;
    Ok(Json(report))
}

async fn list_units(State(state): State<AppState>) -> Json<Vec<Unit>> {
    Json(state.engine.registry().units().to_vec())
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<IngredientCategory>>, ApiError> {
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let categories = db.list_categories().context("database error")?;
    Ok(Json(categories))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ingest", post(ingest))
        .route("/api/canonicalize", post(canonicalize))
        .route("/api/ingredients", get(list_ingredients))
        .route("/api/ingredients/{name}", get(get_ingredient))
        .route("/api/recipes/{recipe_id}/links", get(get_recipe_links))
        .route("/api/migrate", post(migrate))
        .route("/api/units", get(list_units))
        .route("/api/categories", get(list_categories))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key, or `None` when the key is too
/// short to abbreviate without giving most of it away.
fn api_key_hint(key: &str) -> Option<String> {
    if key.chars().count() < 8 {
        return None;
    }
    let head: String = key.chars().take(4).collect();
    let tail: String = key.chars().skip(key.chars().count() - 4).collect();
    Some(format!("{head}...{tail}"))
}

pub async fn start_server(
    db: Database,
    engine: Engine,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        engine: Arc::new(engine),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        match api_key_hint(key) {
            Some(hint) => eprintln!("API key: {hint} (see api_key file in data directory)"),
            None => eprintln!("API key loaded (see api_key file in data directory)"),
        }
    } else {
        warn!("authentication disabled (--no-auth), API is open to anyone");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        warn!(
            bind,
            "listening with no authentication, any device on your network can access this API"
        );
    }

    if new_api_key {
        eprintln!("\nTry it:");
        eprintln!(
            "  curl -H 'Authorization: Bearer <key>' http://{bind}:{port}/api/units"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
