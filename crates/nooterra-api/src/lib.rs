//! Nooterra API - the axum HTTP/SSE surface over sessions, the public
//! agent-card stream, and x402 payment gates (spec C9).

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;

pub use middleware::RateLimiter;
pub use state::AppState;

/// Assembles the full router over a shared, already-constructed
/// [`AppState`]. Nothing here reaches for ambient/global state - every
/// dependency the handlers need travels through `Arc<AppState>`.
pub fn create_router(state: Arc<AppState>, rate_limiter: Arc<RateLimiter>) -> Router {
    routes::api_routes(rate_limiter).with_state(state)
}
