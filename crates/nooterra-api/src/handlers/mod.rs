pub mod agent_cards;
pub mod sessions;
pub mod x402;
