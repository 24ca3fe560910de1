//! Plain terminal presentation for the chat client.
//!
//! - [`console`]: styled line output and the live reply sink.
//! - [`logo`]: per-model ASCII art with a colour gradient.
//! - [`picker`]: numbered model selection.
//!
//! Ownership boundary: this layer only prints and reads; [`crate::core`]
//! owns session state and never writes to the terminal.

pub mod console;
pub mod logo;
pub mod picker;
