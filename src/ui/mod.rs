//! Terminal presentation for the prompt loop.
//!
//! - [`chat_loop`]: reads lines, dispatches [`crate::commands`] and streams
//!   replies from the active [`crate::core::session::Session`].
//! - [`panel`]: the titled reply panel, redrawn while a reply streams in.
//! - [`console`]: status lines, warnings, errors and markdown outside the panel.
//! - [`markdown`], [`theme`] and [`title`]: rendering and style policy.
//!
//! This layer only presents and captures interaction; [`crate::core`] owns
//! conversation state and backend coordination.

pub mod chat_loop;
pub mod console;
pub mod markdown;
pub mod panel;
pub mod theme;
pub mod title;
