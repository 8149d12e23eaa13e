//! Database migrations for the roadwatch service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2024_03_01_000001_create_processed_agent_data;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(
            m2024_03_01_000001_create_processed_agent_data::Migration,
        )]
    }
}
