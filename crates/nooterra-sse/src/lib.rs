//! Resumable SSE delivery core for session event streams and the public
//! agent-card stream (spec §4.4).

pub mod agent_card_stream;
pub mod broadcaster;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod frame;
pub mod session_stream;

pub use broadcaster::{Broadcaster, Subscription, SUBSCRIBER_BUFFER};
pub use cursor::{resolve_cursor, validate_cursor, ResumeCursor};
pub use error::{SseError, SseResult};
pub use filter::EventFilter;
pub use frame::{HeadSnapshot, SseFrame};
