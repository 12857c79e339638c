//! Router assembly (spec §6 endpoint table).

use crate::handlers;
use crate::middleware::{public_rate_limit, RateLimiter};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn api_routes(rate_limiter: Arc<RateLimiter>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/sessions", session_routes())
        .nest("/public/agent-cards", agent_card_routes(rate_limiter))
        .nest("/x402", x402_routes())
}

fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::sessions::create_session))
        .route("/{id}/events", post(handlers::sessions::append_event))
        .route("/{id}/events/stream", get(handlers::sessions::stream_events))
}

fn agent_card_routes(rate_limiter: Arc<RateLimiter>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/stream", get(handlers::agent_cards::stream_agent_cards))
        .layer(axum::middleware::from_fn_with_state(rate_limiter, public_rate_limit))
}

fn x402_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/gate/create", post(handlers::x402::create_gate))
        .route("/gate/quote", post(handlers::x402::quote_gate))
        .route("/wallets/{walletRef}/authorize", post(handlers::x402::authorize_wallet))
        .route("/gate/authorize-payment", post(handlers::x402::authorize_payment))
        .route("/gate/verify", post(handlers::x402::verify_gate))
        .route("/gate/agents/{id}/wind-down", post(handlers::x402::wind_down_agent))
        .route("/gate/escalations/{id}", get(handlers::x402::get_escalation))
}
