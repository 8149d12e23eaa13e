//! Migration to create the processed_agent_data table.
//!
//! Each row is one classified reading submitted by an agent. Only `road_state`
//! is required; every sensor, position and time column is nullable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProcessedAgentData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProcessedAgentData::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProcessedAgentData::RoadState)
                            .string()
                            .not_null()
                            .check(Expr::col(ProcessedAgentData::RoadState).ne("")),
                    )
                    // Weak reference: no foreign key to any users table.
                    .col(ColumnDef::new(ProcessedAgentData::UserId).integer().null())
                    .col(ColumnDef::new(ProcessedAgentData::X).double().null())
                    .col(ColumnDef::new(ProcessedAgentData::Y).double().null())
                    .col(ColumnDef::new(ProcessedAgentData::Z).double().null())
                    .col(ColumnDef::new(ProcessedAgentData::Latitude).double().null())
                    .col(ColumnDef::new(ProcessedAgentData::Longitude).double().null())
                    .col(ColumnDef::new(ProcessedAgentData::Timestamp).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_processed_agent_data_user_id")
                    .table(ProcessedAgentData::Table)
                    .col(ProcessedAgentData::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_processed_agent_data_timestamp")
                    .table(ProcessedAgentData::Table)
                    .col(ProcessedAgentData::Timestamp)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_processed_agent_data_timestamp")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_processed_agent_data_user_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ProcessedAgentData::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProcessedAgentData {
    Table,
    Id,
    RoadState,
    UserId,
    X,
    Y,
    Z,
    Latitude,
    Longitude,
    Timestamp,
}
