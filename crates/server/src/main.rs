//! Methodica Server
//!
//! Axum server exposing the analysis orchestrator over HTTP, plus a CLI for
//! running a single batch without the server.

mod api;

use anyhow::Context;
use axum::http::HeaderValue;
use clap::{Parser, Subcommand};
use methodica_core::config::ServiceConfig;
use methodica_core::methodology::Methodology;
use methodica_core::models::{InferenceLoader, ModelResolver};
use methodica_core::state::{AnalysisDb, DocumentManager, SqliteStore, StoreHandle};
use methodica_core::swarm::{AnalysisRequest, BatchEvent, Orchestrator};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::mpsc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use api::AppState;

#[derive(Parser, Clone)]
#[command(author, version, about = "Methodica - Methodology-driven document analysis")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the analysis server (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one analysis batch and print the result (no server)
    Run {
        /// Project to analyse
        #[arg(short, long)]
        project: String,
        /// Requesting user
        #[arg(short, long, default_value = "cli")]
        user: String,
        /// Agent ids, e.g. grounded-theory phenomenological
        #[arg(required = true)]
        agent_ids: Vec<String>,
    },
    /// List available analysis agents
    Agents,
}

/// Open the configured data store, degrading to disconnected on failure
fn open_store(config: &ServiceConfig) -> (StoreHandle, Option<Arc<DocumentManager>>) {
    let Some(path) = &config.database_path else {
        tracing::warn!("DATABASE_PATH is 'none', running without a data store");
        return (StoreHandle::Disconnected, None);
    };

    match AnalysisDb::open_at(path) {
        Ok(db) => {
            tracing::info!("Data store opened at {}", path.display());
            let store = SqliteStore::new(&db);
            let documents = store.documents();
            (StoreHandle::connected(store), Some(documents))
        }
        Err(e) => {
            tracing::warn!("Failed to open data store at {}: {:#}", path.display(), e);
            (StoreHandle::Disconnected, None)
        }
    }
}

fn build_orchestrator(config: &ServiceConfig, store: StoreHandle) -> anyhow::Result<Orchestrator> {
    let loader = InferenceLoader::new(&config.inference_url, config.inference_token.clone())?;
    let resolver = ModelResolver::new(Arc::new(loader), config.model.clone());
    tracing::info!(
        model = %config.model.model,
        fallbacks = ?config.model.fallbacks,
        "Model resolver configured"
    );
    Ok(Orchestrator::new(
        config.orchestrator_config(),
        Arc::new(resolver),
        store,
    ))
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn run_server(config: ServiceConfig, port: Option<u16>) -> anyhow::Result<()> {
    let (store, documents) = open_store(&config);
    let orchestrator = build_orchestrator(&config, store)?;

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        documents,
    };
    let app = api::router(state).layer(cors_layer(&config.cors_origins)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.port)));
    tracing::info!("Methodica server running at http://{}", addr);
    tracing::info!("  Analysis: POST /run-analysis, GET /batches/:id");
    tracing::info!("  Catalog:  GET /agents");
    tracing::info!("  OpenAPI:  GET /openapi.json");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_once(
    config: ServiceConfig,
    project: String,
    user: String,
    agent_ids: Vec<String>,
) -> anyhow::Result<()> {
    let (store, _) = open_store(&config);
    let (tx, mut rx) = mpsc::channel::<BatchEvent>(256);
    let orchestrator = build_orchestrator(&config, store)?.with_event_channel(tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let agent = event.agent.as_deref().unwrap_or("-");
            match &event.data {
                Some(data) => eprintln!("[{:?}] {} {}", event.kind, agent, data),
                None => eprintln!("[{:?}] {}", event.kind, agent),
            }
            if event.is_terminal() {
                break;
            }
        }
    });

    let result = orchestrator
        .run_analysis(&AnalysisRequest {
            project_id: project,
            user_id: user,
            agent_ids,
        })
        .await;
    drop(orchestrator);
    let _ = printer.await;

    let outcome = result?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn print_agents() {
    for m in Methodology::all() {
        println!("{:<22} {:<28} {}", m.id(), m.display_name(), m.label());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,methodica_core=debug")),
        )
        .init();

    let args = Args::parse();
    let config = ServiceConfig::from_env().context("Failed to load configuration")?;

    match args.command.unwrap_or(CliCommand::Serve { port: None }) {
        CliCommand::Serve { port } => run_server(config, port).await,
        CliCommand::Run {
            project,
            user,
            agent_ids,
        } => run_once(config, project, user, agent_ids).await,
        CliCommand::Agents => {
            print_agents();
            Ok(())
        }
    }
}
