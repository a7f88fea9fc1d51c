//! Business logic: session validation, connection gating, presence lifecycle, event relay.

pub mod gateway;
pub mod presence;
pub mod relay;
pub mod session;

pub use gateway::ConnectionGateway;
pub use presence::PresenceService;
pub use relay::EventRelay;
pub use session::{HttpSessionValidator, SessionValidator};
