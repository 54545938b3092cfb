//! Transponder: a continuously running multi-protocol connectivity tester.
//!
//! The scanner role probes HTTP, HTTPS and gRPC targets in a loop; the server
//! role exposes matching endpoints for it to hit.

pub mod config;
pub mod errors;
pub mod logging;
pub mod proto;
pub mod scanner;
pub mod server;
pub mod version;
