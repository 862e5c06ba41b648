//! Voice command interpretation for a point-of-sale terminal.
//!
//! Recognized speech is answered by keyword rules ([`interpreter`]) or turned
//! into a structured [`command::Command`] by a hosted model constrained to a
//! JSON schema ([`llm_manager`]). [`assistant::Assistant`] combines the two.

pub mod assistant;
pub mod command;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod interpreter;
pub mod knowledge;
pub mod llm_manager;
pub mod logger;
pub mod providers;
pub mod ui;
pub mod wake;
