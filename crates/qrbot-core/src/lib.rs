//! Core of the QR bot: pure QR conversion plus the messenger-neutral plumbing
//! around it (config, dispatch, messaging port, access control, audit).
//!
//! Telegram lives in the adapter crate behind [`messaging::port::MessagingPort`].

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod qr;
pub mod security;
pub mod utils;

pub use errors::{Error, Result};
