//! Headless-browser scraper for prediction-market listings, with a small
//! HTTP API and dashboard over the persisted results.

pub mod acquisition;
pub mod api;
pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod trace;
pub mod types;
