//! A terminal client for a locally running Ollama server.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the streaming session engine: the transport, the
//!   line-delimited stream decoder, session continuity, the turn
//!   orchestrator, file directive extraction, readiness probing, and server
//!   process supervision.
//! - [`ui`] prints styled output, model logos, and the model picker.
//! - [`api`] defines the generate and model-listing payloads.
//! - [`cli`] parses arguments and runs the interactive chat loop.
//! - [`utils`] holds URL helpers, colour detection, and the transcript log.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
