//! Accident Analytics forensic core
//!
//! Evidence intake, integrity validation, AI-driven accident analysis and
//! the case store behind it:
//!
//! - [`evidence`] - intake queue and payload sources
//! - [`validation`] - serial integrity checks run before analysis
//! - [`analysis`] - request building, provider seam and the orchestrator
//! - [`report`] - the report contract, conformance rules, metrics and exports
//! - [`store`] - case list with SQLite and PostgREST mirrors
//! - [`session`] - operator session tokens
//! - [`config`], [`logging`], [`audit`] - ambient plumbing

pub mod analysis;
pub mod audit;
pub mod config;
pub mod evidence;
pub mod logging;
pub mod report;
pub mod session;
pub mod store;
pub mod validation;

#[cfg(feature = "ai-assistant")]
pub mod ai;
