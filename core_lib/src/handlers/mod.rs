//! HTTP handlers and route assembly

pub mod files;
pub mod routes;
