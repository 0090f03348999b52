//! Book catalog service: loads a CSV catalog once and serves content-based
//! recommendations and dataset statistics over HTTP.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod model;
pub mod repo;
pub mod service;
