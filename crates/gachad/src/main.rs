use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures::future::{try_join_all, FutureExt};
use gacha_core::dispatch::{panic_message, DeviceClass};
use gacha_core::error::GachaError;
use gacha_core::reduce::MergedResult;
use gacha_core::request::SimulationRequest;
use gacha_core::worker::run_worker;
use gacha_core::{prepare, DispatchSettings};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "gachad", about = "HTTP daemon serving gacha pull simulations")]
struct Args {
    /// Address to bind (defaults to 127.0.0.1).
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8787)]
    port: u16,

    /// Device class used by the worker heuristic.
    #[arg(long, default_value_t = DeviceClass::Desktop)]
    device: DeviceClass,

    /// Worker threads per request; picked from the CPU count when omitted.
    #[arg(long)]
    workers: Option<usize>,

    /// Largest trial count a single request may ask for.
    #[arg(long = "max-trials", default_value_t = 1_000_000)]
    max_trials: u32,
}

#[derive(Clone, Debug)]
struct AppState {
    settings: DispatchSettings,
    max_trials: u32,
}

#[derive(Debug)]
enum ApiError {
    TooManyTrials { requested: u32, limit: u32 },
    Simulation(GachaError),
}

impl From<GachaError> for ApiError {
    fn from(err: GachaError) -> Self {
        ApiError::Simulation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::TooManyTrials { requested, limit } => (
                StatusCode::BAD_REQUEST,
                format!("trialCount {requested} exceeds the limit of {limit}"),
            ),
            ApiError::Simulation(err) if err.is_configuration() => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Simulation(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Raises the shared cancel flag when the request future is dropped, so
/// blocking workers stop at their next trial boundary.
struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/simulate", post(simulate_handler))
        .route("/health", get(health))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    let state = AppState {
        settings: DispatchSettings {
            workers: args.workers,
            device: args.device,
        },
        max_trials: args.max_trials,
    };

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.bind, args.port))?;

    info!(%addr, device = %args.device, workers = ?args.workers, "starting gachad");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn simulate_handler(
    State(state): State<AppState>,
    Json(request): Json<SimulationRequest>,
) -> Result<Json<MergedResult>, ApiError> {
    if request.trial_count > state.max_trials {
        warn!(requested = request.trial_count, limit = state.max_trials, "rejecting request");
        return Err(ApiError::TooManyTrials {
            requested: request.trial_count,
            limit: state.max_trials,
        });
    }

    let prepared = Arc::new(prepare(&request, &state.settings).map_err(|err| {
        warn!(%err, "invalid simulation request");
        ApiError::from(err)
    })?);
    let guard = CancelOnDrop::new();

    let tasks = prepared.workers.partitions.iter().map(|partition| {
        let partition = *partition;
        let prepared = Arc::clone(&prepared);
        let cancel = guard.flag();
        tokio::task::spawn_blocking(move || {
            run_worker(
                &prepared.plan,
                partition.worker,
                partition.seed,
                partition.trials,
                Some(&cancel),
            )
        })
        .map(move |joined| match joined {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(GachaError::WorkerFailed {
                worker: partition.worker,
                message: panic_message(err.into_panic().as_ref()),
            }),
            Err(err) => Err(GachaError::WorkerFailed {
                worker: partition.worker,
                message: err.to_string(),
            }),
        })
    });

    let results = try_join_all(tasks).await.map_err(|err| {
        error!(%err, "simulation failed");
        ApiError::from(err)
    })?;
    Ok(Json(prepared.finish(&results)))
}
