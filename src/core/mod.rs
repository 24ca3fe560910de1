pub mod config;
pub mod directives;
pub mod error;
pub mod readiness;
pub mod session;
pub mod stream;
pub mod supervisor;
pub mod transport;
pub mod turn;
