//! Durable outbox delivery, webhook signing, idempotency bookkeeping, and
//! the autotick scheduler (spec §4.6).

pub mod delivery;
pub mod error;
pub mod idempotency;
pub mod signing;
pub mod tick;

pub use delivery::{deliver_one, DeliveryOutcome, WebhookTarget};
pub use error::{OutboxError, OutboxResult};
pub use idempotency::{check_idempotency_key, record_response, IdempotencyCheck};
pub use signing::{sign_webhook_body, verify_webhook_signature, SignedWebhook};
pub use tick::{tick_deliveries, tick_x402_insolvency_sweep, tick_x402_winddown_reversals, InsolvencySweepOutcome};
