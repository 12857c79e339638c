//! Rate limiting for the unauthenticated public agent-card stream (spec
//! §6 `PROXY_RATE_LIMIT_RPM`/`PROXY_RATE_LIMIT_BURST`, §7
//! `AGENT_CARD_PUBLIC_DISCOVERY_RATE_LIMITED`).

use crate::error::ApiError;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use nooterra_types::ErrorCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed-window per-IP counter. `burst` caps how far a single window may
/// run ahead of the steady `rpm` rate before requests start getting
/// rejected.
pub struct RateLimiter {
    rpm: u32,
    burst: u32,
    windows: DashMap<SocketAddr, (Instant, u32)>,
}

impl RateLimiter {
    pub fn new(rpm: u32, burst: u32) -> Self {
        Self {
            rpm,
            burst,
            windows: DashMap::new(),
        }
    }

    fn check(&self, addr: SocketAddr) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(addr).or_insert((now, 0));
        if now.duration_since(entry.0) > Duration::from_secs(60) {
            *entry = (now, 0);
        }
        let limit = self.rpm.max(self.burst);
        if entry.1 >= limit {
            return false;
        }
        entry.1 += 1;
        true
    }
}

pub async fn public_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.check(addr) {
        next.run(req).await
    } else {
        ApiError::new(
            ErrorCode::AgentCardPublicDiscoveryRateLimited,
            "too many public agent-card discovery requests",
        )
        .into_response()
    }
}
