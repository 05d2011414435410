//! Charla is a terminal chat client for the Groq API with streaming
//! responses and a transcript that survives restarts.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the turn data model, the transcript store with its
//!   on-disk mirror, the streaming completion pipeline, and the session
//!   orchestration that ties them together.
//! - [`ui`] runs the line-oriented interactive loop that reads user
//!   input and renders streamed output as it arrives.
//! - [`api`] defines the chat completion wire payloads.
//! - [`cli`] parses arguments and dispatches into the session runtime.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and
//! route through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
