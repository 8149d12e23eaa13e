//! Test utilities for database testing.
//!
//! This module provides utilities for setting up in-memory SQLite databases
//! with migrations for testing purposes.

use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use roadwatch::config::AppConfig;
use roadwatch::repositories::ProcessedAgentDataRepository;
use roadwatch::server::AppState;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// # Returns
///
/// Returns a Result containing the database connection
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    // Create in-memory SQLite database
    let db = Database::connect("sqlite::memory:").await?;

    // Run all migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Sets up an in-memory SQLite database with all migrations applied and returns an Arc.
#[allow(dead_code)]
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    let db = setup_test_db().await?;
    Ok(Arc::new(db))
}

/// Repository over a fresh, migrated in-memory database.
#[allow(dead_code)]
pub async fn setup_test_repository() -> Result<ProcessedAgentDataRepository> {
    Ok(ProcessedAgentDataRepository::new(setup_test_db_arc().await?))
}

/// Application state over a fresh, migrated in-memory database.
#[allow(dead_code)]
pub async fn setup_test_state() -> Result<AppState> {
    let db = setup_test_db().await?;
    let config = AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        ..Default::default()
    };
    Ok(AppState::new(config, db))
}
