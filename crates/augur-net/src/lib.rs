//! Message plumbing between a predicting party and the authority:
//! the versioned wire codec, and an in-memory link that simulates latency.

pub mod channel;
pub mod error;
pub mod link;
pub mod messages;

pub use channel::Channel;
pub use error::NetError;
pub use link::{LinkConfig, SimulatedLink};
pub use messages::{Message, PROTOCOL_VERSION, PredictionRequest, decode, encode};
