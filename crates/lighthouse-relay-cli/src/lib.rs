//! Front end for lighthouse-relay: CLI commands, logging setup and the HTTP
//! trigger server.

pub mod doctor;
pub mod logging;
pub mod run_cmd;
#[cfg(feature = "server")]
pub mod server;
