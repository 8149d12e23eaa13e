//! # Repository Layer
//!
//! This module contains repository implementations that encapsulate SeaORM operations
//! for database entities, providing a clean API for data access.

pub mod processed_agent_data;

pub use processed_agent_data::{
    DEFAULT_PAGE_LIMIT, ListQuery, MAX_PAGE_LIMIT, Page, ProcessedAgentDataRepository,
    RecordFilter, RecordScan, SortDirection,
};
