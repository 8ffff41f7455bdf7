//! Application-facing data access façade.
//!
//! # Responsibility
//! - Expose narrow cat/report use-cases over an injected `Driver`.
//! - Keep callers decoupled from query construction details.

pub mod cat_service;
