//! The `Store` abstraction (spec §4.3): entity-specific getters/listers plus
//! a single atomic mutator, `commit_tx`.

use crate::entities::*;
use crate::error::StoreResult;
use crate::ops::CommitTx;
use async_trait::async_trait;
use nooterra_chain::{ChainedEvent, StreamHead};
use nooterra_types::{
    AgentId, EscalationId, GateId, OutboxMessageId, SessionId, SponsorWalletRef, StreamId,
    TenantId,
};

/// Entity-specific reads plus the single atomic write path. Implementations
/// must apply `commit_tx`'s ops all-or-nothing: any validation failure
/// aborts the whole batch with no side effects.
#[async_trait]
pub trait Store: Send + Sync {
    async fn commit_tx(&self, tx: CommitTx) -> StoreResult<()>;

    async fn get_session(&self, tenant: &TenantId, id: &SessionId) -> StoreResult<Option<Session>>;
    /// Ordered by `updatedAt ASC, entityId ASC`.
    async fn list_sessions(&self, tenant: &TenantId) -> StoreResult<Vec<Session>>;

    async fn get_stream_events(
        &self,
        tenant: &TenantId,
        stream_id: &StreamId,
    ) -> StoreResult<Vec<ChainedEvent>>;
    async fn get_stream_head(&self, tenant: &TenantId, stream_id: &StreamId) -> StoreResult<StreamHead>;

    async fn get_agent_card(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Option<AgentCard>>;
    /// Ordered by `updatedAt ASC, entityId ASC`.
    async fn list_agent_cards(&self, tenant: &TenantId) -> StoreResult<Vec<AgentCard>>;
    /// All public, non-removed cards across every tenant, same ordering.
    async fn list_public_agent_cards(&self) -> StoreResult<Vec<AgentCard>>;

    async fn get_gate(&self, tenant: &TenantId, gate_id: &GateId) -> StoreResult<Option<X402Gate>>;
    async fn list_gates_by_payer(&self, tenant: &TenantId, agent_id: &AgentId) -> StoreResult<Vec<X402Gate>>;
    /// Gates in `authorized` state for this payer - the wind-down unwind
    /// sweep's reversal target set.
    async fn list_authorized_unverified_gates(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<X402Gate>>;
    /// Gates whose quote is still active (`quoted` state, not yet canceled).
    async fn list_active_quoted_gates(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<X402Gate>>;
    /// Gates whose `agentPassport.expiresAt` has passed `now`, across every
    /// tenant - input to the insolvency sweep's delegation-expired branch.
    async fn list_gates_with_expired_passport(&self, now: &str) -> StoreResult<Vec<X402Gate>>;

    async fn get_wallet_policy(
        &self,
        sponsor_wallet_ref: &SponsorWalletRef,
    ) -> StoreResult<Option<X402WalletPolicy>>;
    /// Sum of authorization amounts already decided today for this wallet,
    /// used to enforce `maxDailyAuthorizationCents`.
    async fn sum_todays_authorizations(
        &self,
        sponsor_wallet_ref: &SponsorWalletRef,
        day: &str,
    ) -> StoreResult<nooterra_types::Cents>;

    async fn get_agent_lifecycle(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Option<X402AgentLifecycle>>;

    async fn get_escalation(
        &self,
        tenant: &TenantId,
        escalation_id: &EscalationId,
    ) -> StoreResult<Option<Escalation>>;
    async fn list_pending_escalations_by_agent(
        &self,
        tenant: &TenantId,
        agent_id: &AgentId,
    ) -> StoreResult<Vec<Escalation>>;

    /// Messages with `nextAttemptAt <= now`, not yet delivered or dead.
    async fn list_due_outbox_messages(
        &self,
        tenant: Option<&TenantId>,
        now: &str,
        message_type: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<OutboxMessage>>;
    async fn find_outbox_by_dispatch_id(
        &self,
        tenant: &TenantId,
        dispatch_id: &nooterra_types::DispatchId,
    ) -> StoreResult<Option<OutboxMessage>>;
    async fn get_outbox_message(
        &self,
        tenant: &TenantId,
        id: &OutboxMessageId,
    ) -> StoreResult<Option<OutboxMessage>>;

    async fn get_idempotency_record(
        &self,
        tenant: &TenantId,
        key: &str,
    ) -> StoreResult<Option<IdempotencyRecord>>;

    async fn get_agent_run_settlement(
        &self,
        tenant: &TenantId,
        settlement_id: &nooterra_types::SettlementId,
    ) -> StoreResult<Option<AgentRunSettlement>>;

    /// Every tenant with at least one entity, for sweep fan-out.
    async fn list_tenant_ids(&self) -> StoreResult<Vec<TenantId>>;
}
