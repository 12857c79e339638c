//! CLI/env configuration (spec §6 environment variable table).

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "nooterra-server")]
#[command(author, version, about = "Nooterra agent-commerce control plane server")]
pub struct Args {
    /// `memory` (default, in-process) or `pg` (Postgres, requires DATABASE_URL).
    #[arg(long, env = "STORE", default_value = "memory")]
    pub store: String,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "PROXY_PG_SCHEMA", default_value = "public")]
    pub pg_schema: String,

    /// Host:port to bind the HTTP surface to.
    #[arg(long, env = "PROXY_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Whether the tick scheduler (deliveries, insolvency sweep, wind-down
    /// reversal dispatch) runs automatically on a timer in this process.
    #[arg(long, env = "PROXY_AUTOTICK", default_value_t = true)]
    pub autotick: bool,

    #[arg(long, env = "PROXY_AUTOTICK_INTERVAL_MS", default_value_t = 5_000)]
    pub autotick_interval_ms: u64,

    #[arg(long, env = "PROXY_MAX_BODY_BYTES", default_value_t = 1_048_576)]
    pub max_body_bytes: usize,

    #[arg(long, env = "PROXY_INGEST_MAX_EVENTS", default_value_t = 1_000)]
    pub ingest_max_events: usize,

    #[arg(long, env = "PROXY_RATE_LIMIT_RPM", default_value_t = 600)]
    pub rate_limit_rpm: u32,

    #[arg(long, env = "PROXY_RATE_LIMIT_BURST", default_value_t = 60)]
    pub rate_limit_burst: u32,

    #[arg(long, env = "PROXY_OUTBOX_MAX_ATTEMPTS", default_value_t = 8)]
    pub outbox_max_attempts: u32,

    #[arg(long, env = "PROXY_RECLAIM_AFTER_SECONDS", default_value_t = 300)]
    pub reclaim_after_seconds: u64,

    /// Clamped to 3600 per spec §6.
    #[arg(long, env = "PROXY_EVIDENCE_PRESIGN_MAX_SECONDS", default_value_t = 3600)]
    pub evidence_presign_max_seconds: u64,

    #[arg(long, env = "PROXY_SECRETS_CACHE_TTL_SECONDS", default_value_t = 60)]
    pub secrets_cache_ttl_seconds: u64,

    #[arg(long, env = "PROXY_ALLOW_INLINE_SECRETS", default_value_t = false)]
    pub allow_inline_secrets: bool,

    /// Hex-encoded 32-byte Ed25519 seed for the control plane's signer. A
    /// fresh ephemeral key is generated (and a warning logged) when unset -
    /// fine for local dev, unsuitable for a deployment that must keep
    /// verifying old signatures across restarts.
    #[arg(long, env = "PROXY_SIGNER_SEED_HEX")]
    pub signer_seed_hex: Option<String>,
}

impl Args {
    pub fn evidence_presign_max_seconds(&self) -> u64 {
        self.evidence_presign_max_seconds.min(3600)
    }
}
