//! Nooterra Server - serves the HTTP/SSE control-plane surface and runs the
//! outbox/insolvency tick scheduler in one binary (spec §6, §4.6).

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nooterra_api::{create_router, AppState, RateLimiter};
use nooterra_crypto::{KeyPair, LocalSigner, Signer};
use nooterra_store::{MemoryStore, Store};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting nooterra-server");

    let store: Arc<dyn Store> = build_store(&args).await?;
    let signer: Arc<dyn Signer> = Arc::new(build_signer(&args));

    let state = Arc::new(AppState::new(store.clone(), signer));
    let rate_limiter = Arc::new(RateLimiter::new(args.rate_limit_rpm, args.rate_limit_burst));

    let app = create_router(state, rate_limiter)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(args.max_body_bytes));

    if args.autotick {
        spawn_tick_loop(store, Duration::from_millis(args.autotick_interval_ms));
    } else {
        tracing::info!("PROXY_AUTOTICK disabled; run tick jobs out-of-process");
    }

    let listener = tokio::net::TcpListener::bind(&args.bind_addr).await?;
    tracing::info!(addr = %args.bind_addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

async fn build_store(args: &Args) -> anyhow::Result<Arc<dyn Store>> {
    match args.store.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "pg" => {
            let url = args
                .database_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required when STORE=pg"))?;
            let url = with_search_path(&url, &args.pg_schema);
            let pg = nooterra_store::PgStore::connect(&url, 10).await?;
            pg.migrate().await?;
            Ok(Arc::new(pg))
        }
        other => anyhow::bail!("unknown STORE backend: {other}"),
    }
}

/// Folds `PROXY_PG_SCHEMA` into the connection as a libpq `search_path`
/// option rather than threading it through `PgStore`, which only ever sees
/// one schema per pool.
fn with_search_path(database_url: &str, schema: &str) -> String {
    if schema == "public" {
        return database_url.to_string();
    }
    let separator = if database_url.contains('?') { '&' } else { '?' };
    format!("{database_url}{separator}options=-c search_path%3D{schema}")
}

fn build_signer(args: &Args) -> LocalSigner {
    let keypair = match &args.signer_seed_hex {
        Some(hex_seed) => {
            let bytes = hex::decode(hex_seed).expect("PROXY_SIGNER_SEED_HEX must be valid hex");
            let seed: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .expect("PROXY_SIGNER_SEED_HEX must decode to exactly 32 bytes");
            KeyPair::from_seed_bytes(&seed)
        }
        None => {
            tracing::warn!("PROXY_SIGNER_SEED_HEX not set; generating an ephemeral signing key for this process");
            KeyPair::generate()
        }
    };
    let key_id = format!("server-{}", &nooterra_crypto::PublicKey::from_keypair(&keypair).0[..16]);
    LocalSigner::new(keypair, key_id)
}

fn spawn_tick_loop(store: Arc<dyn Store>, interval: Duration) {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now().to_rfc3339();

            if let Err(err) = nooterra_outbox::tick_deliveries(store.as_ref(), &client, &now, 100, |_tenant| None).await {
                tracing::warn!(%err, "tick_deliveries failed");
            }
            if let Err(err) = nooterra_outbox::tick_x402_insolvency_sweep(store.as_ref(), &now).await {
                tracing::warn!(%err, "tick_x402_insolvency_sweep failed");
            }
            if let Err(err) = nooterra_outbox::tick_x402_winddown_reversals(store.as_ref(), &now, 100).await {
                tracing::warn!(%err, "tick_x402_winddown_reversals failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
