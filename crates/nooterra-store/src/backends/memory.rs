//! In-memory `Store`: single-writer discipline over per-tenant maps, used
//! for tests and local dev (spec §4.3).

use crate::entities::*;
use crate::error::{StoreError, StoreResult};
use crate::ops::{CommitTx, Op};
use crate::traits::Store;
use async_trait::async_trait;
use dashmap::DashMap;
use nooterra_chain::{ChainedEvent, StreamHead};
use nooterra_types::{
    AgentId, Cents, DispatchId, EscalationId, GateId, OutboxMessageId, SessionId,
    SettlementId, SponsorWalletRef, StreamId, TenantId,
};
use tokio::sync::Mutex;

type TKey = (String, String);

fn tkey(tenant: &TenantId, id: &str) -> TKey {
    (tenant.as_str().to_string(), id.to_string())
}

/// A single-process store backed by sharded concurrent maps. All mutation
/// goes through `commit_tx`, which serializes writers behind `write_lock` -
/// the in-memory analogue of the Postgres backend's `SERIALIZABLE`
/// transaction.
#[derive(Default)]
pub struct MemoryStore {
    write_lock: Mutex<()>,
    sessions: DashMap<TKey, Session>,
    streams: DashMap<TKey, Vec<ChainedEvent>>,
    agent_cards: DashMap<TKey, AgentCard>,
    gates: DashMap<TKey, X402Gate>,
    wallet_policies: DashMap<String, X402WalletPolicy>,
    agent_lifecycles: DashMap<TKey, X402AgentLifecycle>,
    escalations: DashMap<TKey, Escalation>,
    outbox: DashMap<TKey, OutboxMessage>,
    outbox_dispatch_index: DashMap<TKey, String>,
    idempotency: DashMap<TKey, IdempotencyRecord>,
    settlements: DashMap<TKey, AgentRunSettlement>,
    authorizations_by_wallet_day: DashMap<(String, String), i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn precheck(&self, op: &Op) -> StoreResult<()> {
        match op {
            Op::SessionAppendEvent {
                tenant_id,
                session_id,
                ..
            } => {
                if !self.sessions.contains_key(&tkey(tenant_id, session_id.as_str())) {
                    return Err(StoreError::NotFound(format!(
                        "session {session_id} not found"
                    )));
                }
                Ok(())
            }
            Op::OutboxMarkDelivered { tenant_id, id, .. }
            | Op::OutboxMarkAttemptFailed { tenant_id, id, .. }
            | Op::OutboxMarkDead { tenant_id, id } => {
                if !self.outbox.contains_key(&tkey(tenant_id, id.as_str())) {
                    return Err(StoreError::NotFound(format!("outbox message {id} not found")));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn apply(&self, op: Op) {
        match op {
            Op::SessionCreate(session) => {
                let key = tkey(&session.tenant_id, session.session_id.as_str());
                self.sessions.insert(key, session);
            }
            Op::SessionAppendEvent {
                tenant_id,
                session_id,
                stream_id,
                event,
            } => {
                let skey = tkey(&tenant_id, stream_id.as_str());
                let mut entry = self.streams.entry(skey).or_default();
                entry.push(event.clone());

                let key = tkey(&tenant_id, session_id.as_str());
                if let Some(mut session) = self.sessions.get_mut(&key) {
                    session.last_event_id = Some(event.id.as_str().to_string());
                    session.last_chain_hash = Some(event.chain_hash.clone());
                    session.updated_at = event.at.clone();
                    session.revision += 1;
                }
            }
            Op::AgentCardUpsert(card) => {
                let key = tkey(&card.tenant_id, card.agent_id.as_str());
                self.agent_cards.insert(key, card);
            }
            Op::AgentCardRemove {
                tenant_id,
                agent_id,
                ..
            } => {
                let key = tkey(&tenant_id, agent_id.as_str());
                if let Some(mut card) = self.agent_cards.get_mut(&key) {
                    card.removed = true;
                }
            }
            Op::X402GatePut(gate) => {
                let key = tkey(&gate.tenant_id, gate.gate_id.as_str());
                self.gates.insert(key, gate);
            }
            Op::X402WalletPolicyPut(policy) => {
                self.wallet_policies
                    .insert(policy.sponsor_wallet_ref.as_str().to_string(), policy);
            }
            Op::X402AgentLifecyclePut(lifecycle) => {
                let key = tkey(&lifecycle.tenant_id, lifecycle.agent_id.as_str());
                self.agent_lifecycles.insert(key, lifecycle);
            }
            Op::EscalationPut(escalation) => {
                let key = tkey(&escalation.tenant_id, escalation.escalation_id.as_str());
                self.escalations.insert(key, escalation);
            }
            Op::OutboxEnqueue(message) => {
                let key = tkey(&message.tenant_id, message.id.as_str());
                if let Some(dispatch_id) = &message.dispatch_id {
                    self.outbox_dispatch_index.insert(
                        tkey(&message.tenant_id, dispatch_id.as_str()),
                        message.id.as_str().to_string(),
                    );
                }
                self.outbox.insert(key, message);
            }
            Op::OutboxMarkDelivered {
                tenant_id,
                id,
                delivered_at,
            } => {
                let key = tkey(&tenant_id, id.as_str());
                if let Some(mut msg) = self.outbox.get_mut(&key) {
                    msg.delivered_at = Some(delivered_at);
                }
            }
            Op::OutboxMarkAttemptFailed {
                tenant_id,
                id,
                next_attempt_at,
                attempts,
            } => {
                let key = tkey(&tenant_id, id.as_str());
                if let Some(mut msg) = self.outbox.get_mut(&key) {
                    msg.next_attempt_at = next_attempt_at;
                    msg.attempts = attempts;
                }
            }
            Op::OutboxMarkDead { tenant_id, id } => {
                let key = tkey(&tenant_id, id.as_str());
                if let Some(mut msg) = self.outbox.get_mut(&key) {
                    msg.dead = true;
                }
            }
            Op::IdempotencyPut(record) => {
                let key = tkey(&record.tenant_id, &record.key);
                self.idempotency.insert(key, record);
            }
            Op::AgentRunSettlementPut(settlement) => {
                let key = tkey(&settlement.tenant_id, settlement.settlement_id.as_str());
                self.settlements.insert(key, settlement);
            }
            Op::X402RecordDailyAuthorization {
                sponsor_wallet_ref,
                day,
                amount_cents,
            } => {
                let key = (sponsor_wallet_ref.as_str().to_string(), day);
                *self.authorizations_by_wallet_day.entry(key).or_insert(0) += amount_cents.0;
            }
        }
    }
}

fn sort_by_updated_then_id<T>(items: &mut Vec<T>, updated_at: impl Fn(&T) -> String, id: impl Fn(&T) -> String) {
    items.sort_by(|a, b| {
        let ua = updated_at(a);
        let ub = updated_at(b);
        ua.cmp(&ub).then_with(|| id(a).cmp(&id(b)))
    });
}

#[async_trait]
impl Store for MemoryStore {
    async fn commit_tx(&self, tx: CommitTx) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        for op in &tx.ops {
            self.precheck(op)?;
        }
        for op in tx.ops {
            self.apply(op);
        }
        Ok(())
    }

    async fn get_session(&self, tenant: &TenantId, id: &SessionId) -> StoreResult<Option<Session>> {
        Ok(self.sessions.get(&tkey(tenant, id.as_str())).map(|r| r.clone()))
    }

    async fn list_sessions(&self, tenant: &TenantId) -> StoreResult<Vec<Session>> {
        let mut items: Vec<Session> = self
            .sessions
            .iter()
            .filter(|e| e.key().0 == tenant.as_str())
            .map(|e| e.value().clone())
            .collect();
        sort_by_updated_then_id(
            &mut items,
            |s| s.updated_at.clone(),
            |s| s.session_id.as_str().to_string(),
        );
        Ok(items)
    }

    async fn get_stream_events(
        &self,
        tenant: &TenantId,
        stream_id: &StreamId,
    ) -> StoreResult<Vec<ChainedEvent>> {
        Ok(self
            .streams
            .get(&tkey(tenant, stream_id.as_str()))
            .map(|r| r.clone())
            .unwrap_or_default())
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
        Ok(self.agent_cards.get(&tkey(tenant, agent_id.as_str())).map(|r| r.clone()))
    }

    async fn list_agent_cards(&self, tenant: &TenantId) -> StoreResult<Vec<AgentCard>> {
        let mut items: Vec<AgentCard> = self
            .agent_cards
            .iter()
            .filter(|e| e.key().0 == tenant.as_str() && !e.value().removed)
            .map(|e| e.value().clone())
            .collect();
        sort_by_updated_then_id(
            &mut items,
            |c| c.updated_at.clone(),
            |c| c.agent_id.as_str().to_string(),
        );
        Ok(items)
    }

    async fn list_public_agent_cards(&self) -> StoreResult<Vec<AgentCard>> {
        let mut items: Vec<AgentCard> = self
            .agent_cards
            .iter()
            .filter(|e| !e.value().removed && matches!(e.value().visibility, Visibility::Public))
            .map(|e| e.value().clone())
            .collect();
        sort_by_updated_then_id(
            &mut items,
            |c| c.updated_at.clone(),
            |c| c.agent_id.as_str().to_string(),
        );
        Ok(items)
    }

    async fn get_gate(&self, tenant: &TenantId, gate_id: &GateId) -> StoreResult<Option<X402Gate>> {
        Ok(self.gates.get(&tkey(tenant, gate_id.as_str())).map(|r| r.clone()))
    }

    async fn list_gates_by_payer(&self, tenant: &TenantId, agent_id: &AgentId) -> StoreResult<Vec<X402Gate>> {
        Ok(self
            .gates
            .iter()
            .filter(|e| e.key().0 == tenant.as_str() && e.value().payer_agent_id == *agent_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_authorized_unverified_gates(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<X402Gate>> {
        Ok(self
            .gates
            .iter()
            .filter(|e| {
                e.key().0 == tenant.as_str()
                    && e.value().payer_agent_id == *agent_id
                    && matches!(e.value().state, GateState::Authorized)
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_active_quoted_gates(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<X402Gate>> {
        Ok(self
            .gates
            .iter()
            .filter(|e| {
                e.key().0 == tenant.as_str()
                    && e.value().payer_agent_id == *agent_id
                    && matches!(e.value().state, GateState::Quoted)
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_gates_with_expired_passport(&self, now: &str) -> StoreResult<Vec<X402Gate>> {
        Ok(self
            .gates
            .iter()
            .filter(|e| {
                e.value()
                    .agent_passport
                    .as_ref()
                    .map(|p| p.expires_at.as_str() < now)
                    .unwrap_or(false)
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn get_wallet_policy(
        &self,
        sponsor_wallet_ref: &SponsorWalletRef,
    ) -> StoreResult<Option<X402WalletPolicy>> {
        Ok(self
            .wallet_policies
            .get(sponsor_wallet_ref.as_str())
            .map(|r| r.clone()))
    }

    async fn sum_todays_authorizations(
        &self,
        sponsor_wallet_ref: &SponsorWalletRef,
        day: &str,
    ) -> StoreResult<Cents> {
        Ok(Cents(
            self.authorizations_by_wallet_day
                .get(&(sponsor_wallet_ref.as_str().to_string(), day.to_string()))
                .map(|v| *v)
                .unwrap_or(0),
        ))
    }

    async fn get_agent_lifecycle(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Option<X402AgentLifecycle>> {
        Ok(self
            .agent_lifecycles
            .get(&tkey(tenant, agent_id.as_str()))
            .map(|r| r.clone()))
    }

    async fn get_escalation(
        &self,
        tenant: &TenantId,
        escalation_id: &EscalationId,
    ) -> StoreResult<Option<Escalation>> {
        Ok(self
            .escalations
            .get(&tkey(tenant, escalation_id.as_str()))
            .map(|r| r.clone()))
    }

    async fn list_pending_escalations_by_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<Escalation>> {
        Ok(self
            .escalations
            .iter()
            .filter(|e| {
                e.key().0 == tenant.as_str()
                    && e.value().agent_id == *agent_id
                    && matches!(e.value().status, EscalationStatus::Pending)
            })
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_due_outbox_messages(
        &self,
        tenant: Option<&TenantId>,
        now: &str,
        message_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<OutboxMessage>> {
        let mut items: Vec<OutboxMessage> = self
            .outbox
            .iter()
            .filter(|e| {
                let msg = e.value();
                tenant.map(|t| t.as_str() == e.key().0).unwrap_or(true)
                    && msg.delivered_at.is_none()
                    && !msg.dead
                    && msg.next_attempt_at.as_str() <= now
                    && message_type.map(|t| t == msg.message_type).unwrap_or(true)
            })
            .map(|e| e.value().clone())
            .collect();
        items.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        items.truncate(limit);
        Ok(items)
    }

    async fn find_outbox_by_dispatch_id(
        &self,
        tenant: &TenantId,
        dispatch_id: &DispatchId,
    ) -> StoreResult<Option<OutboxMessage>> {
        let Some(id) = self
            .outbox_dispatch_index
            .get(&tkey(tenant, dispatch_id.as_str()))
            .map(|r| r.clone())
        else {
            return Ok(None);
        };
        Ok(self.outbox.get(&tkey(tenant, &id)).map(|r| r.clone()))
    }

    async fn get_outbox_message(
        &self,
        tenant: &TenantId,
        id: &OutboxMessageId,
    ) -> StoreResult<Option<OutboxMessage>> {
        Ok(self.outbox.get(&tkey(tenant, id.as_str())).map(|r| r.clone()))
    }

    async fn get_idempotency_record(
        &self,
        tenant: &TenantId,
        key: &str,
    ) -> StoreResult<Option<IdempotencyRecord>> {
        Ok(self.idempotency.get(&tkey(tenant, key)).map(|r| r.clone()))
    }

    async fn get_agent_run_settlement(
        &self,
        tenant: &TenantId,
        settlement_id: &SettlementId,
    ) -> StoreResult<Option<AgentRunSettlement>> {
        Ok(self
            .settlements
            .get(&tkey(tenant, settlement_id.as_str()))
            .map(|r| r.clone()))
    }

    async fn list_tenant_ids(&self) -> StoreResult<Vec<TenantId>> {
        let mut set = std::collections::BTreeSet::new();
        for e in self.gates.iter() {
            set.insert(e.key().0.clone());
        }
        for e in self.sessions.iter() {
            set.insert(e.key().0.clone());
        }
        for e in self.outbox.iter() {
            set.insert(e.key().0.clone());
        }
        Ok(set.into_iter().map(TenantId::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nooterra_chain::{append, create_event, CreateEventInput};

    fn tenant() -> TenantId {
        TenantId::new("t1")
    }

    #[tokio::test]
    async fn session_create_then_append_updates_head() {
        let store = MemoryStore::new();
        let session_id = SessionId::new("sess_1");
        let stream_id = StreamId::new("session:sess_1");
        let session = Session {
            tenant_id: tenant(),
            session_id: session_id.clone(),
            visibility: Visibility::Tenant,
            participants: Default::default(),
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
            last_event_id: None,
            last_chain_hash: None,
            revision: 0,
        };
        store
            .commit_tx(CommitTx {
                at: "2026-01-01T00:00:00Z".into(),
                ops: vec![Op::SessionCreate(session)],
            })
            .await
            .unwrap();

        let draft = create_event(CreateEventInput {
            stream_id: stream_id.clone(),
            event_type: "session.message".into(),
            actor: "agent_a".into(),
            payload: serde_json::json!({"text": "hi"}),
            at: Some("2026-01-01T00:00:01Z".into()),
            id: None,
        });
        let events = append(&[], draft, None).await.unwrap();

        store
            .commit_tx(CommitTx {
                at: "2026-01-01T00:00:01Z".into(),
                ops: vec![Op::SessionAppendEvent {
                    tenant_id: tenant(),
                    session_id: session_id.clone(),
                    stream_id: stream_id.clone(),
                    event: events[0].clone(),
                }],
            })
            .await
            .unwrap();

        let head = store.get_stream_head(&tenant(), &stream_id).await.unwrap();
        assert_eq!(head.event_count, 1);
        let session = store.get_session(&tenant(), &session_id).await.unwrap().unwrap();
        assert_eq!(session.last_event_id, Some(events[0].id.as_str().to_string()));
    }

    #[tokio::test]
    async fn append_to_missing_session_rolls_back_whole_batch() {
        let store = MemoryStore::new();
        let draft = create_event(CreateEventInput {
            stream_id: StreamId::new("session:missing"),
            event_type: "session.message".into(),
            actor: "agent_a".into(),
            payload: serde_json::json!({}),
            at: Some("2026-01-01T00:00:00Z".into()),
            id: None,
        });
        let events = append(&[], draft, None).await.unwrap();

        let card = AgentCard {
            tenant_id: tenant(),
            agent_id: AgentId::new("agent_a"),
            visibility: Visibility::Public,
            capabilities: vec![],
            host: "h".into(),
            tools: vec![],
            updated_at: "2026-01-01T00:00:00Z".into(),
            revision: 0,
            removed: false,
        };

        let result = store
            .commit_tx(CommitTx {
                at: "2026-01-01T00:00:00Z".into(),
                ops: vec![
                    Op::AgentCardUpsert(card),
                    Op::SessionAppendEvent {
                        tenant_id: tenant(),
                        session_id: SessionId::new("missing"),
                        stream_id: StreamId::new("session:missing"),
                        event: events[0].clone(),
                    },
                ],
            })
            .await;
        assert!(result.is_err());
        // the agent card upsert must not have been applied either.
        assert!(store
            .get_agent_card(&tenant(), &AgentId::new("agent_a"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn outbox_dispatch_id_lookup_dedupes() {
        let store = MemoryStore::new();
        let dispatch_id = DispatchId::new("dispatch_1");
        let message = OutboxMessage {
            tenant_id: tenant(),
            id: OutboxMessageId::new("msg_1"),
            message_type: "X402_AGENT_WINDDOWN_REVERSAL_REQUESTED".into(),
            at: "2026-01-01T00:00:00Z".into(),
            payload: serde_json::json!({}),
            attempts: 0,
            next_attempt_at: "2026-01-01T00:00:00Z".into(),
            delivered_at: None,
            dead: false,
            dispatch_id: Some(dispatch_id.clone()),
        };
        store
            .commit_tx(CommitTx {
                at: "2026-01-01T00:00:00Z".into(),
                ops: vec![Op::OutboxEnqueue(message)],
            })
            .await
            .unwrap();

        let found = store
            .find_outbox_by_dispatch_id(&tenant(), &dispatch_id)
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn daily_authorization_ledger_accumulates_same_day() {
        let store = MemoryStore::new();
        let wallet = SponsorWalletRef::new("wallet_1");
        let day = "2026-01-01";

        for amount in [500_i64, 250, 100] {
            store
                .commit_tx(CommitTx {
                    at: "2026-01-01T00:00:00Z".into(),
                    ops: vec![Op::X402RecordDailyAuthorization {
                        sponsor_wallet_ref: wallet.clone(),
                        day: day.into(),
                        amount_cents: Cents(amount),
                    }],
                })
                .await
                .unwrap();
        }

        let total = store.sum_todays_authorizations(&wallet, day).await.unwrap();
        assert_eq!(total, Cents(850));

        let other_day = store
            .sum_todays_authorizations(&wallet, "2026-01-02")
            .await
            .unwrap();
        assert_eq!(other_day, Cents(0));
    }
}
