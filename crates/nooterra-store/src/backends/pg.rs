//! Postgres-backed `Store` (spec §4.3, `pg` feature).
//!
//! Every `commit_tx` batch runs inside one `SERIALIZABLE` transaction.
//! Entities are kept as JSONB documents rather than normalized columns -
//! the typed shape lives in [`crate::entities`] and Postgres only needs to
//! persist it durably, index it by tenant, and enforce the revision check
//! each op carries. Mirrors the repository-over-`PgPool` shape used
//! throughout the rest of this workspace's Postgres layer.

use crate::entities::*;
use crate::error::{StoreError, StoreResult};
use crate::ops::{CommitTx, Op};
use crate::traits::Store;
use async_trait::async_trait;
use nooterra_chain::{ChainedEvent, StreamHead};
use nooterra_types::{
    AgentId, Cents, DispatchId, EscalationId, GateId, OutboxMessageId, SessionId,
    SponsorWalletRef, StreamId, TenantId,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};
use tracing::info;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        info!("connecting to postgres store backend");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("connect: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migrate: {e}")))?;
        Ok(())
    }

    async fn apply_one(tx: &mut Transaction<'_, Postgres>, op: Op) -> StoreResult<()> {
        match op {
            Op::SessionCreate(session) => {
                let data = serde_json::to_value(&session)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO sessions (tenant_id, entity_id, revision, data, updated_at) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(session.tenant_id.as_str())
                .bind(session.session_id.as_str())
                .bind(session.revision as i64)
                .bind(data)
                .bind(&session.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::SessionAppendEvent {
                tenant_id,
                session_id,
                stream_id,
                event,
            } => {
                let row = sqlx::query("SELECT revision, data FROM sessions WHERE tenant_id = $1 AND entity_id = $2 FOR UPDATE")
                    .bind(tenant_id.as_str())
                    .bind(session_id.as_str())
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?
                    .ok_or_else(|| StoreError::NotFound(format!("session {}", session_id.as_str())))?;
                let raw: serde_json::Value = row.try_get("data").map_err(|e| StoreError::Backend(e.to_string()))?;
                let mut session: Session =
                    serde_json::from_value(raw).map_err(|e| StoreError::Backend(e.to_string()))?;

                let data = serde_json::to_value(&event)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO stream_events (tenant_id, stream_id, event_id, chain_hash, data) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(tenant_id.as_str())
                .bind(stream_id.as_str())
                .bind(event.id.as_str())
                .bind(&event.chain_hash)
                .bind(data)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

                session.last_event_id = Some(event.id.as_str().to_string());
                session.last_chain_hash = Some(event.chain_hash.clone());
                session.updated_at = event.at.clone();
                session.revision += 1;
                let data = serde_json::to_value(&session)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "UPDATE sessions SET revision = $3, data = $4, updated_at = $5 \
                     WHERE tenant_id = $1 AND entity_id = $2",
                )
                .bind(tenant_id.as_str())
                .bind(session_id.as_str())
                .bind(session.revision as i64)
                .bind(data)
                .bind(&session.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::AgentCardUpsert(card) => {
                let data = serde_json::to_value(&card)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                let visibility = serde_json::to_value(card.visibility)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                sqlx::query(
                    "INSERT INTO agent_cards (tenant_id, entity_id, revision, visibility, removed, data, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) \
                     ON CONFLICT (tenant_id, entity_id) DO UPDATE SET \
                         revision = EXCLUDED.revision, visibility = EXCLUDED.visibility, \
                         removed = EXCLUDED.removed, data = EXCLUDED.data, updated_at = EXCLUDED.updated_at",
                )
                .bind(card.tenant_id.as_str())
                .bind(card.agent_id.as_str())
                .bind(card.revision as i64)
                .bind(visibility)
                .bind(card.removed)
                .bind(data)
                .bind(&card.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::AgentCardRemove {
                tenant_id,
                agent_id,
                reason_code,
            } => {
                let row = sqlx::query("SELECT data FROM agent_cards WHERE tenant_id = $1 AND entity_id = $2 FOR UPDATE")
                    .bind(tenant_id.as_str())
                    .bind(agent_id.as_str())
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?
                    .ok_or_else(|| StoreError::NotFound(format!("agent card {}", agent_id.as_str())))?;
                let raw: serde_json::Value = row.try_get("data").map_err(|e| StoreError::Backend(e.to_string()))?;
                let mut card: AgentCard =
                    serde_json::from_value(raw).map_err(|e| StoreError::Backend(e.to_string()))?;
                card.removed = true;
                card.revision += 1;
                let _ = reason_code;
                let data = serde_json::to_value(&card)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "UPDATE agent_cards SET removed = TRUE, revision = $3, data = $4 \
                     WHERE tenant_id = $1 AND entity_id = $2",
                )
                .bind(tenant_id.as_str())
                .bind(agent_id.as_str())
                .bind(card.revision as i64)
                .bind(data)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::X402GatePut(gate) => {
                let data = serde_json::to_value(&gate)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                let state = serde_json::to_value(gate.state)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let passport_expires_at = gate.agent_passport.as_ref().map(|p| p.expires_at.clone());
                sqlx::query(
                    "INSERT INTO x402_gates (tenant_id, entity_id, revision, payer_agent_id, state, passport_expires_at, data, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     ON CONFLICT (tenant_id, entity_id) DO UPDATE SET \
                         revision = EXCLUDED.revision, state = EXCLUDED.state, \
                         passport_expires_at = EXCLUDED.passport_expires_at, \
                         data = EXCLUDED.data, updated_at = EXCLUDED.updated_at",
                )
                .bind(gate.tenant_id.as_str())
                .bind(gate.gate_id.as_str())
                .bind(gate.revision as i64)
                .bind(gate.payer_agent_id.as_str())
                .bind(state)
                .bind(passport_expires_at)
                .bind(data)
                .bind(&gate.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::X402WalletPolicyPut(policy) => {
                let data = serde_json::to_value(&policy)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO x402_wallet_policies (sponsor_wallet_ref, data, updated_at) \
                     VALUES ($1, $2, now()) \
                     ON CONFLICT (sponsor_wallet_ref) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
                )
                .bind(policy.sponsor_wallet_ref.as_str())
                .bind(data)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::X402AgentLifecyclePut(lifecycle) => {
                let data = serde_json::to_value(&lifecycle)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO x402_agent_lifecycles (tenant_id, entity_id, revision, data, updated_at) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (tenant_id, entity_id) DO UPDATE SET \
                         revision = EXCLUDED.revision, data = EXCLUDED.data, updated_at = EXCLUDED.updated_at",
                )
                .bind(lifecycle.tenant_id.as_str())
                .bind(lifecycle.agent_id.as_str())
                .bind(lifecycle.revision as i64)
                .bind(data)
                .bind(&lifecycle.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::EscalationPut(escalation) => {
                let data = serde_json::to_value(&escalation)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                let status = serde_json::to_value(escalation.status)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                sqlx::query(
                    "INSERT INTO escalations (tenant_id, entity_id, agent_id, status, data, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6) \
                     ON CONFLICT (tenant_id, entity_id) DO UPDATE SET \
                         status = EXCLUDED.status, data = EXCLUDED.data, updated_at = EXCLUDED.updated_at",
                )
                .bind(escalation.tenant_id.as_str())
                .bind(escalation.escalation_id.as_str())
                .bind(escalation.agent_id.as_str())
                .bind(status)
                .bind(data)
                .bind(&escalation.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::OutboxEnqueue(message) => {
                let data = serde_json::to_value(&message)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO outbox_messages \
                     (tenant_id, entity_id, message_type, next_attempt_at, delivered_at, dead, dispatch_id, data) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                )
                .bind(message.tenant_id.as_str())
                .bind(message.id.as_str())
                .bind(&message.message_type)
                .bind(&message.next_attempt_at)
                .bind(&message.delivered_at)
                .bind(message.dead)
                .bind(message.dispatch_id.as_ref().map(|d| d.as_str().to_string()))
                .bind(data)
                .execute(&mut **tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::Validation("duplicate dispatch_id".into())
                    } else {
                        StoreError::Backend(e.to_string())
                    }
                })?;
            }
            Op::OutboxMarkDelivered {
                tenant_id,
                id,
                delivered_at,
            } => {
                let mut message = Self::load_outbox(tx, &tenant_id, &id).await?;
                message.delivered_at = Some(delivered_at.clone());
                let data = serde_json::to_value(&message)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "UPDATE outbox_messages SET delivered_at = $3, data = $4 \
                     WHERE tenant_id = $1 AND entity_id = $2",
                )
                .bind(tenant_id.as_str())
                .bind(id.as_str())
                .bind(delivered_at)
                .bind(data)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::OutboxMarkAttemptFailed {
                tenant_id,
                id,
                next_attempt_at,
                attempts,
            } => {
                let mut message = Self::load_outbox(tx, &tenant_id, &id).await?;
                message.attempts = attempts;
                message.next_attempt_at = next_attempt_at.clone();
                let data = serde_json::to_value(&message)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "UPDATE outbox_messages SET next_attempt_at = $3, data = $4 \
                     WHERE tenant_id = $1 AND entity_id = $2",
                )
                .bind(tenant_id.as_str())
                .bind(id.as_str())
                .bind(next_attempt_at)
                .bind(data)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::OutboxMarkDead { tenant_id, id } => {
                let mut message = Self::load_outbox(tx, &tenant_id, &id).await?;
                message.dead = true;
                let data = serde_json::to_value(&message)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "UPDATE outbox_messages SET dead = TRUE, data = $3 \
                     WHERE tenant_id = $1 AND entity_id = $2",
                )
                .bind(tenant_id.as_str())
                .bind(id.as_str())
                .bind(data)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::IdempotencyPut(record) => {
                let data = serde_json::to_value(&record)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO idempotency_records (tenant_id, key, data, created_at) \
                     VALUES ($1, $2, $3, $4) ON CONFLICT (tenant_id, key) DO NOTHING",
                )
                .bind(record.tenant_id.as_str())
                .bind(&record.key)
                .bind(data)
                .bind(&record.created_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::AgentRunSettlementPut(settlement) => {
                let data = serde_json::to_value(&settlement)
                    .map_err(|e| StoreError::Validation(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO agent_run_settlements (tenant_id, entity_id, revision, data) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (tenant_id, entity_id) DO UPDATE SET \
                         revision = EXCLUDED.revision, data = EXCLUDED.data",
                )
                .bind(settlement.tenant_id.as_str())
                .bind(settlement.settlement_id.as_str())
                .bind(settlement.revision as i64)
                .bind(data)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            Op::X402RecordDailyAuthorization {
                sponsor_wallet_ref,
                day,
                amount_cents,
            } => {
                sqlx::query(
                    "INSERT INTO x402_authorization_ledger (sponsor_wallet_ref, day, amount_cents) \
                     VALUES ($1, $2, $3) \
                     ON CONFLICT (sponsor_wallet_ref, day) \
                     DO UPDATE SET amount_cents = x402_authorization_ledger.amount_cents + EXCLUDED.amount_cents",
                )
                .bind(sponsor_wallet_ref.as_str())
                .bind(day)
                .bind(amount_cents.0)
                .execute(&mut **tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }
        Ok(())
    }

    async fn load_outbox(
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: &TenantId,
        id: &OutboxMessageId,
    ) -> StoreResult<OutboxMessage> {
        let row = sqlx::query("SELECT data FROM outbox_messages WHERE tenant_id = $1 AND entity_id = $2 FOR UPDATE")
            .bind(tenant_id.as_str())
            .bind(id.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or_else(|| StoreError::NotFound(format!("outbox message {}", id.as_str())))?;
        let raw: serde_json::Value = row.try_get("data").map_err(|e| StoreError::Backend(e.to_string()))?;
        serde_json::from_value(raw).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn row_to<T: serde::de::DeserializeOwned>(row: sqlx::postgres::PgRow) -> StoreResult<T> {
    let raw: serde_json::Value = row.try_get("data").map_err(|e| StoreError::Backend(e.to_string()))?;
    serde_json::from_value(raw).map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl Store for PgStore {
    async fn commit_tx(&self, commit: CommitTx) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        for op in commit.ops {
            Self::apply_one(&mut tx, op).await?;
        }
        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        let _ = commit.at;
        Ok(())
    }

    async fn get_session(&self, tenant: &TenantId, id: &SessionId) -> StoreResult<Option<Session>> {
        let row = sqlx::query("SELECT data FROM sessions WHERE tenant_id = $1 AND entity_id = $2")
            .bind(tenant.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn list_sessions(&self, tenant: &TenantId) -> StoreResult<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT data FROM sessions WHERE tenant_id = $1 ORDER BY updated_at ASC, entity_id ASC",
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn get_stream_events(
        &self,
        tenant: &TenantId,
        stream_id: &StreamId,
    ) -> StoreResult<Vec<ChainedEvent>> {
        let rows = sqlx::query(
            "SELECT data FROM stream_events WHERE tenant_id = $1 AND stream_id = $2 ORDER BY seq ASC",
        )
        .bind(tenant.as_str())
        .bind(stream_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn get_stream_head(&self, tenant: &TenantId, stream_id: &StreamId) -> StoreResult<StreamHead> {
        let events = self.get_stream_events(tenant, stream_id).await?;
        Ok(StreamHead::from_events(stream_id.clone(), &events))
    }

    async fn get_agent_card(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Option<AgentCard>> {
        let row = sqlx::query("SELECT data FROM agent_cards WHERE tenant_id = $1 AND entity_id = $2")
            .bind(tenant.as_str())
            .bind(agent_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn list_agent_cards(&self, tenant: &TenantId) -> StoreResult<Vec<AgentCard>> {
        let rows = sqlx::query(
            "SELECT data FROM agent_cards WHERE tenant_id = $1 ORDER BY updated_at ASC, entity_id ASC",
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn list_public_agent_cards(&self) -> StoreResult<Vec<AgentCard>> {
        let rows = sqlx::query(
            "SELECT data FROM agent_cards WHERE visibility = 'public' AND removed = FALSE \
             ORDER BY updated_at ASC, entity_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn get_gate(&self, tenant: &TenantId, gate_id: &GateId) -> StoreResult<Option<X402Gate>> {
        let row = sqlx::query("SELECT data FROM x402_gates WHERE tenant_id = $1 AND entity_id = $2")
            .bind(tenant.as_str())
            .bind(gate_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn list_gates_by_payer(&self, tenant: &TenantId, agent_id: &AgentId) -> StoreResult<Vec<X402Gate>> {
        let rows = sqlx::query(
            "SELECT data FROM x402_gates WHERE tenant_id = $1 AND payer_agent_id = $2 ORDER BY updated_at ASC",
        )
        .bind(tenant.as_str())
        .bind(agent_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn list_authorized_unverified_gates(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<X402Gate>> {
        let rows = sqlx::query(
            "SELECT data FROM x402_gates WHERE tenant_id = $1 AND payer_agent_id = $2 AND state = 'authorized' \
             ORDER BY updated_at ASC",
        )
        .bind(tenant.as_str())
        .bind(agent_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn list_active_quoted_gates(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<X402Gate>> {
        let rows = sqlx::query(
            "SELECT data FROM x402_gates WHERE tenant_id = $1 AND payer_agent_id = $2 AND state = 'quoted' \
             ORDER BY updated_at ASC",
        )
        .bind(tenant.as_str())
        .bind(agent_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn list_gates_with_expired_passport(&self, now: &str) -> StoreResult<Vec<X402Gate>> {
        let rows = sqlx::query(
            "SELECT data FROM x402_gates WHERE passport_expires_at IS NOT NULL AND passport_expires_at < $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn get_wallet_policy(
        &self,
        sponsor_wallet_ref: &SponsorWalletRef,
    ) -> StoreResult<Option<X402WalletPolicy>> {
        let row = sqlx::query("SELECT data FROM x402_wallet_policies WHERE sponsor_wallet_ref = $1")
            .bind(sponsor_wallet_ref.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn sum_todays_authorizations(
        &self,
        sponsor_wallet_ref: &SponsorWalletRef,
        day: &str,
    ) -> StoreResult<Cents> {
        let row = sqlx::query(
            "SELECT amount_cents FROM x402_authorization_ledger WHERE sponsor_wallet_ref = $1 AND day = $2",
        )
        .bind(sponsor_wallet_ref.as_str())
        .bind(day)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        let cents: i64 = row.map(|r| r.try_get("amount_cents")).transpose().map_err(|e: sqlx::Error| StoreError::Backend(e.to_string()))?.unwrap_or(0);
        Ok(Cents(cents))
    }

    async fn get_agent_lifecycle(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Option<X402AgentLifecycle>> {
        let row = sqlx::query("SELECT data FROM x402_agent_lifecycles WHERE tenant_id = $1 AND entity_id = $2")
            .bind(tenant.as_str())
            .bind(agent_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn get_escalation(
        &self,
        tenant: &TenantId,
        escalation_id: &EscalationId,
    ) -> StoreResult<Option<Escalation>> {
        let row = sqlx::query("SELECT data FROM escalations WHERE tenant_id = $1 AND entity_id = $2")
            .bind(tenant.as_str())
            .bind(escalation_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn list_pending_escalations_by_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<Escalation>> {
        let rows = sqlx::query(
            "SELECT data FROM escalations WHERE tenant_id = $1 AND agent_id = $2 AND status = 'pending' \
             ORDER BY updated_at ASC",
        )
        .bind(tenant.as_str())
        .bind(agent_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn list_due_outbox_messages(
        &self,
        tenant: Option<&TenantId>,
        now: &str,
        message_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<OutboxMessage>> {
        let rows = match (tenant, message_type) {
            (Some(t), Some(mt)) => sqlx::query(
                "SELECT data FROM outbox_messages WHERE tenant_id = $1 AND message_type = $2 \
                 AND delivered_at IS NULL AND dead = FALSE AND next_attempt_at <= $3 \
                 ORDER BY next_attempt_at ASC LIMIT $4",
            )
            .bind(t.as_str())
            .bind(mt)
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
            (Some(t), None) => sqlx::query(
                "SELECT data FROM outbox_messages WHERE tenant_id = $1 \
                 AND delivered_at IS NULL AND dead = FALSE AND next_attempt_at <= $2 \
                 ORDER BY next_attempt_at ASC LIMIT $3",
            )
            .bind(t.as_str())
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
            (None, Some(mt)) => sqlx::query(
                "SELECT data FROM outbox_messages WHERE message_type = $1 \
                 AND delivered_at IS NULL AND dead = FALSE AND next_attempt_at <= $2 \
                 ORDER BY next_attempt_at ASC LIMIT $3",
            )
            .bind(mt)
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
            (None, None) => sqlx::query(
                "SELECT data FROM outbox_messages \
                 WHERE delivered_at IS NULL AND dead = FALSE AND next_attempt_at <= $1 \
                 ORDER BY next_attempt_at ASC LIMIT $2",
            )
            .bind(now)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to).collect()
    }

    async fn find_outbox_by_dispatch_id(
        &self,
        tenant: &TenantId,
        dispatch_id: &DispatchId,
    ) -> StoreResult<Option<OutboxMessage>> {
        let row = sqlx::query("SELECT data FROM outbox_messages WHERE tenant_id = $1 AND dispatch_id = $2")
            .bind(tenant.as_str())
            .bind(dispatch_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn get_outbox_message(
        &self,
        tenant: &TenantId,
        id: &OutboxMessageId,
    ) -> StoreResult<Option<OutboxMessage>> {
        let row = sqlx::query("SELECT data FROM outbox_messages WHERE tenant_id = $1 AND entity_id = $2")
            .bind(tenant.as_str())
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn get_idempotency_record(
        &self,
        tenant: &TenantId,
        key: &str,
    ) -> StoreResult<Option<IdempotencyRecord>> {
        let row = sqlx::query("SELECT data FROM idempotency_records WHERE tenant_id = $1 AND key = $2")
            .bind(tenant.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn get_agent_run_settlement(
        &self,
        tenant: &TenantId,
        settlement_id: &nooterra_types::SettlementId,
    ) -> StoreResult<Option<AgentRunSettlement>> {
        let row = sqlx::query("SELECT data FROM agent_run_settlements WHERE tenant_id = $1 AND entity_id = $2")
            .bind(tenant.as_str())
            .bind(settlement_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to).transpose()
    }

    async fn list_tenant_ids(&self) -> StoreResult<Vec<TenantId>> {
        let rows = sqlx::query(
            "SELECT DISTINCT tenant_id FROM sessions \
             UNION SELECT DISTINCT tenant_id FROM agent_cards \
             UNION SELECT DISTINCT tenant_id FROM x402_gates",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|r| {
                r.try_get::<String, _>("tenant_id")
                    .map(TenantId::new)
                    .map_err(|e| StoreError::Backend(e.to_string()))
            })
            .collect()
    }
}
