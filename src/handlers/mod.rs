//! Request handlers: the socket endpoint and the HTTP read surface.

pub mod http;
pub mod ws;

pub use http::*;
pub use ws::*;
