//! Webhook delivery with exponential backoff and dead-lettering
//! (spec §4.6 `tickDeliveries`).

use crate::error::OutboxResult;
use crate::signing::sign_webhook_body;
use nooterra_store::{CommitTx, Op, OutboxMessage, Store};
use std::time::Duration;

/// Where and how a tenant's outbox messages are delivered. Endpoint
/// configuration lives outside this crate's store (it is operator-supplied
/// secret material, not tenant domain state); callers resolve it and pass
/// it in per tick.
pub struct WebhookTarget<'a> {
    pub url: &'a str,
    pub secret: &'a str,
}

pub struct DeliveryOutcome {
    pub message_id: String,
    pub delivered: bool,
    pub dead_lettered: bool,
    pub detail: String,
}

const MAX_ATTEMPTS: u32 = 8;
const BASE_BACKOFF_SECONDS: i64 = 2;
const MAX_BACKOFF_SECONDS: i64 = 3600;

fn backoff_seconds(attempts: u32) -> i64 {
    let exp = BASE_BACKOFF_SECONDS.saturating_pow(attempts.min(20));
    exp.min(MAX_BACKOFF_SECONDS)
}

/// Delivers one message via HTTP POST and commits the resulting state
/// transition (delivered / attempt-failed / dead).
pub async fn deliver_one(
    client: &reqwest::Client,
    store: &dyn Store,
    target: WebhookTarget<'_>,
    message: OutboxMessage,
    now: &str,
) -> OutboxResult<DeliveryOutcome> {
    let body = serde_json::to_string(&message.payload).unwrap_or_default();
    let timestamp = now.to_string();
    let signed = sign_webhook_body(target.secret, &timestamp, &body);

    let send_result = client
        .post(target.url)
        .header("X-Proxy-Timestamp", &signed.timestamp)
        .header("X-Proxy-Signature", &signed.signature_hex)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(10))
        .body(body)
        .send()
        .await;

    let message_id = message.id.as_str().to_string();

    match send_result {
        Ok(response) if response.status().is_success() => {
            store
                .commit_tx(CommitTx {
                    at: now.to_string(),
                    ops: vec![Op::OutboxMarkDelivered {
                        tenant_id: message.tenant_id,
                        id: message.id,
                        delivered_at: now.to_string(),
                    }],
                })
                .await?;
            Ok(DeliveryOutcome {
                message_id,
                delivered: true,
                dead_lettered: false,
                detail: "delivered".to_string(),
            })
        }
        // A 4xx is the receiving endpoint permanently rejecting this body
        // (bad signature, unknown route, validation failure); retrying it
        // would only repeat the same rejection, so it dead-letters on the
        // first attempt rather than burning the backoff schedule.
        Ok(response) if response.status().is_client_error() => {
            let detail = format!("permanent_4xx: status {}", response.status());
            store
                .commit_tx(CommitTx {
                    at: now.to_string(),
                    ops: vec![Op::OutboxMarkDead {
                        tenant_id: message.tenant_id,
                        id: message.id,
                    }],
                })
                .await?;
            Ok(DeliveryOutcome {
                message_id,
                delivered: false,
                dead_lettered: true,
                detail,
            })
        }
        other => {
            let detail = match other {
                Ok(response) => format!("non-success status {}", response.status()),
                Err(err) => err.to_string(),
            };
            let attempts = message.attempts + 1;
            if attempts >= MAX_ATTEMPTS {
                store
                    .commit_tx(CommitTx {
                        at: now.to_string(),
                        ops: vec![Op::OutboxMarkDead {
                            tenant_id: message.tenant_id,
                            id: message.id,
                        }],
                    })
                    .await?;
                Ok(DeliveryOutcome {
                    message_id,
                    delivered: false,
                    dead_lettered: true,
                    detail,
                })
            } else {
                let next_attempt_at = chrono::DateTime::parse_from_rfc3339(now)
                    .map(|t| t.with_timezone(&chrono::Utc) + chrono::Duration::seconds(backoff_seconds(attempts)))
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|_| now.to_string());
                store
                    .commit_tx(CommitTx {
                        at: now.to_string(),
                        ops: vec![Op::OutboxMarkAttemptFailed {
                            tenant_id: message.tenant_id,
                            id: message.id,
                            next_attempt_at,
                            attempts,
                        }],
                    })
                    .await?;
                Ok(DeliveryOutcome {
                    message_id,
                    delivered: false,
                    dead_lettered: false,
                    detail,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nooterra_store::MemoryStore;
    use nooterra_types::{DispatchId, OutboxMessageId, TenantId};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff_seconds(0), 1);
        assert_eq!(backoff_seconds(1), 2);
        assert!(backoff_seconds(15) <= MAX_BACKOFF_SECONDS);
    }

    /// Spawns a one-shot stub server that replies with `status` to the next
    /// request it receives and then exits.
    async fn spawn_stub(status: u16) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let body = "{}";
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn sample_message(attempts: u32) -> OutboxMessage {
        OutboxMessage {
            tenant_id: TenantId::new("t1"),
            id: OutboxMessageId::new("msg_1"),
            message_type: "test.message".to_string(),
            at: "2025-01-01T00:00:00Z".to_string(),
            payload: serde_json::json!({}),
            attempts,
            next_attempt_at: "2025-01-01T00:00:00Z".to_string(),
            delivered_at: None,
            dead: false,
            dispatch_id: Some(DispatchId::new("dispatch_1")),
        }
    }

    #[tokio::test]
    async fn a_4xx_response_dead_letters_on_first_attempt_without_retry() {
        let url = spawn_stub(404).await;
        let store = MemoryStore::new();
        let client = reqwest::Client::new();

        let outcome = deliver_one(
            &client,
            &store,
            WebhookTarget { url: &url, secret: "s" },
            sample_message(0),
            "2025-01-01T00:00:00Z",
        )
        .await
        .unwrap();

        assert!(outcome.dead_lettered, "4xx must dead-letter immediately, not retry");
        assert!(!outcome.delivered);
        assert!(outcome.detail.contains("permanent_4xx"));
    }

    #[tokio::test]
    async fn a_5xx_response_backs_off_instead_of_dead_lettering() {
        let url = spawn_stub(503).await;
        let store = MemoryStore::new();
        let client = reqwest::Client::new();

        let outcome = deliver_one(
            &client,
            &store,
            WebhookTarget { url: &url, secret: "s" },
            sample_message(0),
            "2025-01-01T00:00:00Z",
        )
        .await
        .unwrap();

        assert!(!outcome.dead_lettered, "a 5xx should retry via backoff, not dead-letter");
        assert!(!outcome.delivered);
    }
}
