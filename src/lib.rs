//! # Roadwatch Library
//!
//! This library provides the core functionality for the roadwatch service:
//! durable storage of classified road-condition readings, the HTTP API over
//! it, and a per-user live feed of newly stored readings.

pub mod config;
pub mod cursor;
pub mod db;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub use migration;
