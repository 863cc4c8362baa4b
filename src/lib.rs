//! Request → quotation → booking lifecycle and commission engine for a mechanic
//! marketplace.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;
