//! End-to-end tests for the HTTP/SSE surface, built over a real in-memory
//! store and signer rather than mocks.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use nooterra_api::{create_router, AppState, RateLimiter};
use nooterra_crypto::{LocalSigner, Signer};
use nooterra_store::{CommitTx, MemoryStore, Op, ReversalAction, Store, WalletPolicyStatus, X402WalletPolicy};
use nooterra_types::{AgentId, Cents, Currency, PolicyRef, SponsorRef, SponsorWalletRef, ToolId};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower::ServiceExt;

fn test_router() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn Store> = store.clone();
    let signer: Arc<dyn Signer> = Arc::new(LocalSigner::generate("test-key"));
    let state = Arc::new(AppState::new(dyn_store, signer));
    let rate_limiter = Arc::new(RateLimiter::new(600, 60));
    (create_router(state, rate_limiter), store)
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(json!(null));
    (status, json)
}

fn post(uri: &str, tenant: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-proxy-tenant-id", tenant)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, tenant: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-proxy-tenant-id", tenant)
        .body(Body::empty())
        .unwrap()
}

mod sessions {
    use super::*;

    #[tokio::test]
    async fn create_session_then_reject_duplicate() {
        let (router, _store) = test_router();

        let (status, body) = send(
            &router,
            post("/sessions/", "tenant_a", json!({ "sessionId": "sess_1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionId"], "sess_1");
        assert_eq!(body["revision"], 1);

        let (status, _) = send(
            &router,
            post("/sessions/", "tenant_a", json!({ "sessionId": "sess_1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_session_requires_tenant_header() {
        let (router, _store) = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/sessions/")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "sessionId": "sess_1" }).to_string()))
            .unwrap();
        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn append_event_chains_and_replays_on_idempotency_key() {
        let (router, _store) = test_router();
        send(
            &router,
            post("/sessions/", "tenant_a", json!({ "sessionId": "sess_1" })),
        )
        .await;

        let mut req = post(
            "/sessions/sess_1/events",
            "tenant_a",
            json!({ "eventType": "note.created", "actor": "agent_1", "payload": { "text": "hi" } }),
        );
        req.headers_mut()
            .insert("x-idempotency-key", "idem-1".parse().unwrap());
        let (status, first) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["type"], "note.created");
        let first_id = first["id"].clone();

        let mut replay = post(
            "/sessions/sess_1/events",
            "tenant_a",
            json!({ "eventType": "note.created", "actor": "agent_1", "payload": { "text": "hi" } }),
        );
        replay
            .headers_mut()
            .insert("x-idempotency-key", "idem-1".parse().unwrap());
        let (status, second) = send(&router, replay).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["id"], first_id);
    }

    #[tokio::test]
    async fn append_event_rejects_stale_expected_chain_hash() {
        let (router, _store) = test_router();
        send(
            &router,
            post("/sessions/", "tenant_a", json!({ "sessionId": "sess_1" })),
        )
        .await;

        let mut req = post(
            "/sessions/sess_1/events",
            "tenant_a",
            json!({ "eventType": "note.created", "actor": "agent_1", "payload": {} }),
        );
        req.headers_mut()
            .insert("x-proxy-expected-prev-chain-hash", "not-the-real-hash".parse().unwrap());
        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "SESSION_EVENT_CURSOR_CONFLICT");
    }

    #[tokio::test]
    async fn append_event_on_missing_session_is_schema_invalid() {
        let (router, _store) = test_router();
        let (status, _) = send(
            &router,
            post(
                "/sessions/does-not-exist/events",
                "tenant_a",
                json!({ "eventType": "note.created", "actor": "agent_1", "payload": {} }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod x402 {
    use super::*;

    async fn seed_wallet_policy(store: &MemoryStore) {
        let policy = X402WalletPolicy {
            sponsor_ref: SponsorRef::new("sponsor_1"),
            sponsor_wallet_ref: SponsorWalletRef::new("wallet_1"),
            policy_ref: PolicyRef::new("policy_1"),
            policy_version: 1,
            status: WalletPolicyStatus::Active,
            max_amount_cents: Cents(10_000),
            max_daily_authorization_cents: Cents(20_000),
            allowed_provider_ids: BTreeSet::from([AgentId::new("agent_payee")]),
            allowed_tool_ids: BTreeSet::new(),
            allowed_currencies: BTreeSet::from([Currency::new("USD")]),
            allowed_reversal_actions: BTreeSet::from([ReversalAction::VoidAuthorization]),
            require_quote: false,
            require_strict_request_binding: false,
            require_agent_key_match: false,
        };
        store
            .commit_tx(CommitTx {
                at: "2026-01-01T00:00:00Z".to_string(),
                ops: vec![Op::X402WalletPolicyPut(policy)],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn gate_lifecycle_create_quote_authorize() {
        let (router, store) = test_router();
        seed_wallet_policy(&store).await;

        let (status, gate) = send(
            &router,
            post(
                "/x402/gate/create",
                "tenant_a",
                json!({
                    "gateId": "gate_1",
                    "payerAgentId": "agent_payer",
                    "payeeAgentId": "agent_payee",
                    "amountCents": 500,
                    "currency": "USD"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(gate["state"], "created");

        let (status, gate) = send(
            &router,
            post(
                "/x402/gate/quote",
                "tenant_a",
                json!({ "gateId": "gate_1", "quoteId": "quote_1", "expiresAt": "2026-01-01T01:00:00Z" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(gate["state"], "quoted");

        let mut req = post(
            "/x402/wallets/wallet_1/authorize",
            "tenant_a",
            json!({ "gateId": "gate_1" }),
        );
        req.headers_mut()
            .insert("x-idempotency-key", "auth-1".parse().unwrap());
        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gate"]["state"], "authorized");
    }

    #[tokio::test]
    async fn authorize_wallet_requires_idempotency_key() {
        let (router, store) = test_router();
        seed_wallet_policy(&store).await;
        send(
            &router,
            post(
                "/x402/gate/create",
                "tenant_a",
                json!({
                    "gateId": "gate_1",
                    "payerAgentId": "agent_payer",
                    "payeeAgentId": "agent_payee",
                    "amountCents": 500,
                    "currency": "USD"
                }),
            ),
        )
        .await;

        let req = post(
            "/x402/wallets/wallet_1/authorize",
            "tenant_a",
            json!({ "gateId": "gate_1" }),
        );
        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "IDEMPOTENCY_KEY_REQUIRED");
    }

    #[tokio::test]
    async fn authorize_escalates_over_wallet_policy_limit() {
        let (router, store) = test_router();
        seed_wallet_policy(&store).await;
        send(
            &router,
            post(
                "/x402/gate/create",
                "tenant_a",
                json!({
                    "gateId": "gate_big",
                    "payerAgentId": "agent_payer",
                    "payeeAgentId": "agent_payee",
                    "amountCents": 50_000,
                    "currency": "USD"
                }),
            ),
        )
        .await;

        let mut req = post(
            "/x402/wallets/wallet_1/authorize",
            "tenant_a",
            json!({ "gateId": "gate_big" }),
        );
        req.headers_mut()
            .insert("x-idempotency-key", "auth-big".parse().unwrap());
        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("escalationId").is_some());
    }

    #[tokio::test]
    async fn get_escalation_not_found() {
        let (router, _store) = test_router();
        let (status, _) = send(&router, get("/x402/gate/escalations/missing", "tenant_a")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod agent_card_rate_limit {
    use super::*;

    #[tokio::test]
    async fn public_stream_enforces_rate_limit() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let signer: Arc<dyn Signer> = Arc::new(LocalSigner::generate("test-key"));
        let state = Arc::new(AppState::new(store, signer));
        let rate_limiter = Arc::new(RateLimiter::new(1, 1));
        let router = create_router(state, rate_limiter);

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 1234);
        let make_req = || {
            let mut req = Request::builder()
                .method("GET")
                .uri("/public/agent-cards/stream")
                .body(Body::empty())
                .unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
            req
        };

        let first = router.clone().oneshot(make_req()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router.clone().oneshot(make_req()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
