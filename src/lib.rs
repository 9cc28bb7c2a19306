//! Kanban Tracker Library
//!
//! This module exports the core components for testing and integration.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod position;
pub mod store;
pub mod types;
pub mod uploads;
