//! Gatehouse — session-gated front end over a hosted auth service.
//!
//! Two cooperating cores: the [`guard`] middleware gates each request by
//! path class and session presence, and the [`mirror`] keeps a reactive
//! local copy of the authenticated user in sync with the backend's session
//! lifecycle. Everything heavier — hashing, token issuance, row storage —
//! is delegated to the hosted service behind the [`backend`] capabilities.

pub mod backend;
pub mod config;
pub mod guard;
pub mod mirror;
pub mod routes;
pub mod state;
