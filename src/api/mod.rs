use axum::{
    Router,
    extract::{Json, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    FiscalYear, RateTableRegistry, Regime, RegimeComparison, TaxError, TaxInputProfile, evaluate,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliRegime {
    Old,
    New,
}

impl From<CliRegime> for Regime {
    fn from(value: CliRegime) -> Self {
        match value {
            CliRegime::Old => Regime::Old,
            CliRegime::New => Regime::New,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "taxwise",
    about = "Personal income-tax engine comparing the old and new regimes"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "TAXWISE_TABLES",
        help = "Directory of rate table JSON files replacing the built-in set"
    )]
    pub tables: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API over HTTP
    Serve {
        #[arg(long, default_value_t = 8080, env = "TAXWISE_PORT")]
        port: u16,
    },
    /// Compute tax for a JSON profile and print the result
    Compute {
        #[arg(long, help = "Fiscal year, e.g. 2024-25; defaults to the latest table")]
        fiscal_year: Option<FiscalYear>,
        #[arg(long, value_enum, help = "Force a regime instead of comparing both")]
        regime: Option<CliRegime>,
        #[arg(long, default_value = "-", help = "Profile JSON file, or - for stdin")]
        profile: String,
    },
    /// List registered rate tables
    Tables,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Tax(#[from] TaxError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid profile JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no rate tables registered")]
    NoTables,
}

#[derive(Clone)]
struct AppState {
    registry: Arc<RateTableRegistry>,
    default_fiscal_year: FiscalYear,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaxPayload {
    #[serde(default)]
    fiscal_year: Option<FiscalYear>,
    #[serde(default, alias = "regimeHint")]
    regime: Option<Regime>,
    profile: TaxInputProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TableEntry {
    fiscal_year: FiscalYear,
    regime: Regime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TablesResponse {
    default_fiscal_year: FiscalYear,
    tables: Vec<TableEntry>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn load_registry(tables: Option<&Path>) -> Result<RateTableRegistry, TaxError> {
    match tables {
        Some(dir) => {
            let registry = RateTableRegistry::load_dir(dir)?;
            info!(dir = %dir.display(), tables = registry.len(), "loaded rate tables");
            Ok(registry)
        }
        None => RateTableRegistry::builtin(),
    }
}

fn latest_fiscal_year(registry: &RateTableRegistry) -> Option<FiscalYear> {
    registry.entries().map(|(year, _)| year).max()
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let registry = load_registry(cli.tables.as_deref())?;
    match cli.command {
        Command::Serve { port } => run_http_server(port, registry).await?,
        Command::Compute {
            fiscal_year,
            regime,
            profile,
        } => {
            let json = read_profile_source(&profile)?;
            let result = compute_from_json(&registry, &json, fiscal_year, regime.map(Into::into))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Tables => {
            for (year, regime) in registry.entries() {
                println!("{year}\t{regime}");
            }
        }
    }
    Ok(())
}

fn read_profile_source(source: &str) -> Result<String, CliError> {
    if source == "-" {
        let mut json = String::new();
        std::io::stdin().read_to_string(&mut json)?;
        Ok(json)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

fn compute_from_json(
    registry: &RateTableRegistry,
    json: &str,
    fiscal_year: Option<FiscalYear>,
    regime: Option<Regime>,
) -> Result<RegimeComparison, CliError> {
    let profile: TaxInputProfile = serde_json::from_str(json)?;
    let fiscal_year = match fiscal_year {
        Some(year) => year,
        None => latest_fiscal_year(registry).ok_or(CliError::NoTables)?,
    };
    Ok(evaluate(registry, &profile, fiscal_year, regime)?)
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/tables", get(tables_handler))
        .route("/api/tax", post(tax_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, registry: RateTableRegistry) -> std::io::Result<()> {
    let default_fiscal_year = latest_fiscal_year(&registry).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "no rate tables registered")
    })?;
    let state = AppState {
        registry: Arc::new(registry),
        default_fiscal_year,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, default_fiscal_year = %default_fiscal_year, "tax API listening");

    axum::serve(listener, app(state)).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn tables_handler(State(state): State<AppState>) -> Response {
    let tables = state
        .registry
        .entries()
        .map(|(fiscal_year, regime)| TableEntry {
            fiscal_year,
            regime,
        })
        .collect();
    json_response(
        StatusCode::OK,
        TablesResponse {
            default_fiscal_year: state.default_fiscal_year,
            tables,
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn tax_handler(
    State(state): State<AppState>,
    payload: Result<Json<TaxPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected tax request");
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let fiscal_year = payload.fiscal_year.unwrap_or(state.default_fiscal_year);
    match evaluate(&state.registry, &payload.profile, fiscal_year, payload.regime) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => {
            warn!(error = %err, "tax computation failed");
            error_response(tax_error_status(&err), &err.to_string())
        }
    }
}

fn tax_error_status(err: &TaxError) -> StatusCode {
    match err {
        TaxError::UnsupportedFiscalYear { .. } => StatusCode::NOT_FOUND,
        TaxError::IncompatibleProfile(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TaxError::InvalidRateTable { .. } | TaxError::TableSource(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
