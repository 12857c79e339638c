//! Nooterra Chain - the append-only chained event log (spec C2 / §4.2).

pub mod error;
pub mod event;
pub mod log;
pub mod stream_head;

pub use error::{AppendError, ChainIntegrityError, ChainIntegrityReason};
pub use event::{ChainedEvent, DraftEvent};
pub use log::{append, create_event, verify, CreateEventInput};
pub use stream_head::StreamHead;
