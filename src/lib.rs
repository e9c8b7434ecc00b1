//! azc is a terminal chat client that streams replies from remote or local
//! LLM backends into a panel sized to the terminal.
//!
//! The crate is organized in a few layers:
//! - [`core`] owns conversation state, backend selection, configuration and
//!   the model cache.
//! - [`api`] holds the HTTP transports for each backend.
//! - [`commands`] classifies prompt input into commands or chat text.
//! - [`ui`] runs the prompt loop and renders replies and status output.
//! - [`utils`] carries line editing and logging setup.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which
//! builds a [`core::session::Session`] and hands it to [`ui::chat_loop`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
