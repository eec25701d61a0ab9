// Neighborhood Directory - JSON API
// Read-only view of houses and residents; hidden residents never leave here.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use neighborhood_directory::{Directory, Event, House, Resident, SqliteDirectory};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "Neighborhood directory JSON API")]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "directory.db", env = "NEIGHBORHOOD_DB")]
    db: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000", env = "NEIGHBORHOOD_LISTEN")]
    listen: SocketAddr,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    directory: Arc<Mutex<SqliteDirectory>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
        .into_response()
}

/// House response (no internal timestamps)
#[derive(Serialize)]
struct HouseResponse {
    parcel_id: String,
    address: String,
    street_number: String,
    street_name: String,
    city: String,
    state: String,
    zip: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    boundary: Option<serde_json::Value>,
}

impl From<House> for HouseResponse {
    fn from(house: House) -> Self {
        let a = house.attributes;
        Self {
            parcel_id: house.parcel_id,
            address: format!("{} {}", a.street_number, a.street_name).trim().to_string(),
            street_number: a.street_number,
            street_name: a.street_name,
            city: a.city,
            state: a.state,
            zip: a.zip,
            latitude: a.latitude,
            longitude: a.longitude,
            boundary: house.boundary,
        }
    }
}

/// Resident response; contact details only for people still living there
#[derive(Serialize)]
struct ResidentResponse {
    name: Option<String>,
    official_name: Option<String>,
    owner: bool,
    first_seen_at: chrono::DateTime<chrono::Utc>,
    moved_out_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
}

impl From<Resident> for ResidentResponse {
    fn from(resident: Resident) -> Self {
        let current = resident.is_current();
        Self {
            name: resident.name_for_display().map(str::to_string),
            owner: resident.is_owner(),
            official_name: resident.official_name,
            first_seen_at: resident.first_seen_at,
            moved_out_at: resident.moved_out_at,
            email: resident.email.filter(|_| current),
            phone: resident.phone.filter(|_| current),
        }
    }
}

#[derive(Deserialize)]
struct ResidentQuery {
    #[serde(default)]
    include_former: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// Run `f` against the directory, mapping failures to HTTP errors
fn with_directory<T, F>(state: &AppState, f: F) -> Response
where
    T: Serialize,
    F: FnOnce(&SqliteDirectory) -> neighborhood_directory::Result<Option<T>>,
{
    let directory = match state.directory.lock() {
        Ok(guard) => guard,
        Err(_) => {
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "directory lock poisoned".to_string(),
            )
        }
    };

    match f(&directory) {
        Ok(Some(data)) => ApiResponse::ok(data),
        Ok(None) => failure(StatusCode::NOT_FOUND, "not found".to_string()),
        Err(e) => {
            error!(error = ?e, "directory query failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/houses - All houses
async fn list_houses(State(state): State<AppState>) -> Response {
    with_directory(&state, |dir| {
        let houses: Vec<HouseResponse> = dir.all_houses()?.into_iter().map(Into::into).collect();
        Ok(Some(houses))
    })
}

/// GET /api/houses/:parcel_id - One house
async fn get_house(State(state): State<AppState>, Path(parcel_id): Path<String>) -> Response {
    with_directory(&state, |dir| {
        Ok(dir.find_house(&parcel_id)?.map(HouseResponse::from))
    })
}

/// GET /api/houses/:parcel_id/residents?include_former=true
async fn get_residents(
    State(state): State<AppState>,
    Path(parcel_id): Path<String>,
    Query(query): Query<ResidentQuery>,
) -> Response {
    with_directory(&state, |dir| {
        let Some(house) = dir.find_house(&parcel_id)? else {
            return Ok(None);
        };

        let residents: Vec<ResidentResponse> = dir
            .residents(&house.id, query.include_former)?
            .into_iter()
            .filter(|r| !r.hidden)
            .map(Into::into)
            .collect();

        Ok(Some(residents))
    })
}

/// GET /api/houses/:parcel_id/history - Audit trail
async fn get_history(State(state): State<AppState>, Path(parcel_id): Path<String>) -> Response {
    with_directory(&state, |dir| {
        let Some(house) = dir.find_house(&parcel_id)? else {
            return Ok(None);
        };
        let events: Vec<Event> = dir.history(&house.id)?;
        Ok(Some(events))
    })
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/houses", get(list_houses))
        .route("/houses/:parcel_id", get(get_house))
        .route("/houses/:parcel_id/residents", get(get_residents))
        .route("/houses/:parcel_id/history", get(get_history))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neighborhood_directory=info,directory_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if !args.db.exists() {
        anyhow::bail!(
            "Database not found at {:?}; run `neighborhood-directory import` first",
            args.db
        );
    }

    let directory = SqliteDirectory::open(&args.db)
        .with_context(|| format!("Failed to open database {:?}", args.db))?;
    info!("Database opened: {:?}", args.db);

    let state = AppState {
        directory: Arc::new(Mutex::new(directory)),
    };

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", args.listen))?;

    info!("Server running on http://{}/api/houses", args.listen);

    axum::serve(listener, router(state))
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
