//! Shared helpdesk types.
//!
//! `models` holds the domain records handed out by the stores, `api` the
//! request/response bodies and JWT claims of the HTTP layer.
pub mod api;
pub mod models;
