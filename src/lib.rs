//! Toxicity classification for text and voice messages.
//!
//! The [`classifier`] module owns the model; [`api`] serves it over HTTP and
//! [`bot`] puts it behind a Telegram bot with speech-to-text in front.

pub mod api;
pub mod bot;
pub mod classifier;
pub mod config;
pub mod logging;
pub mod schemas;
