//! HTTP server exposing the query endpoint.
//!
//! - [`api`]: Router construction and the route handler

pub mod api;
