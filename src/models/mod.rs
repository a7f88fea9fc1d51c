//! Data models for identities, presence entries, and relayed events.

pub mod event;
pub mod identity;
pub mod presence;

pub use event::*;
pub use identity::*;
pub use presence::*;
