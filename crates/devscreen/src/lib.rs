//! Adaptive developmental screening engine.
//!
//! The engine drives a multi-phase questionnaire session, keeps category risk scores in step
//! with the recorded answers, and synthesizes a clinical-style result once the session ends.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
