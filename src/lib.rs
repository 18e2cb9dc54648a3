pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod geocode;
pub mod models;
pub mod observability;
pub mod pricing;
pub mod state;
