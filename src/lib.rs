pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pdu;
pub mod queue;
pub mod reassembler;
pub mod service;
pub mod transport;

pub use error::{GatewayError, GatewayResult};
