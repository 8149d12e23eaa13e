//! # Processed Agent Data Repository
//!
//! This module contains the repository for classified road readings, providing
//! insert, lookup, filtered keyset-paginated listing and deletion.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::RepositoryError;
use crate::models::processed_agent_data::{Column, Entity as ProcessedAgentData, Model};
use crate::models::NewProcessedAgentRecord;

/// Page size used when a query does not specify one
pub const DEFAULT_PAGE_LIMIT: u64 = 50;

/// Largest page size `list` accepts
pub const MAX_PAGE_LIMIT: u64 = 10_000;

/// Optional, AND-combined predicates for listing and counting records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub user_id: Option<i32>,
    pub road_state: Option<String>,
    /// Inclusive lower bound on `timestamp`
    pub timestamp_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`
    pub timestamp_to: Option<DateTime<Utc>>,
    /// `true`: both coordinates present; `false`: at least one missing
    pub has_location: Option<bool>,
}

impl RecordFilter {
    pub fn for_user(user_id: i32) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), RepositoryError> {
        if let (Some(from), Some(to)) = (self.timestamp_from, self.timestamp_to)
            && from > to
        {
            return Err(RepositoryError::Validation(
                "timestamp_from must not be later than timestamp_to".to_string(),
            ));
        }
        Ok(())
    }

    fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(user_id) = self.user_id {
            condition = condition.add(Column::UserId.eq(user_id));
        }

        if let Some(road_state) = &self.road_state {
            condition = condition.add(Column::RoadState.eq(road_state.as_str()));
        }

        if let Some(from) = self.timestamp_from {
            condition = condition.add(Column::Timestamp.gte(from.naive_utc()));
        }

        if let Some(to) = self.timestamp_to {
            condition = condition.add(Column::Timestamp.lte(to.naive_utc()));
        }

        match self.has_location {
            Some(true) => {
                condition = condition
                    .add(Column::Latitude.is_not_null())
                    .add(Column::Longitude.is_not_null());
            }
            Some(false) => {
                condition = condition.add(
                    Condition::any()
                        .add(Column::Latitude.is_null())
                        .add(Column::Longitude.is_null()),
                );
            }
            None => {}
        }

        condition
    }
}

/// Ordering by record id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Filter, ordering and keyset pagination for a list call
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: RecordFilter,
    pub direction: SortDirection,
    pub limit: u64,
    /// Exclusive keyset position: only ids past this one (in `direction`) are returned
    pub after: Option<i32>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: RecordFilter::default(),
            direction: SortDirection::Asc,
            limit: DEFAULT_PAGE_LIMIT,
            after: None,
        }
    }
}

impl ListQuery {
    fn validate(&self) -> Result<(), RepositoryError> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(RepositoryError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        self.filter.validate()
    }

    fn select(&self) -> Select<ProcessedAgentData> {
        let mut query = ProcessedAgentData::find().filter(self.filter.condition());

        query = match (self.direction, self.after) {
            (SortDirection::Asc, Some(after)) => query.filter(Column::Id.gt(after)),
            (SortDirection::Desc, Some(after)) => query.filter(Column::Id.lt(after)),
            (_, None) => query,
        };

        match self.direction {
            SortDirection::Asc => query.order_by_asc(Column::Id),
            SortDirection::Desc => query.order_by_desc(Column::Id),
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Model>,
    /// Keyset position for the following page; `None` on the last page
    pub next_cursor: Option<i32>,
}

impl Page {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Repository for processed agent data operations
#[derive(Debug, Clone)]
pub struct ProcessedAgentDataRepository {
    /// Database connection pool
    db: Arc<DatabaseConnection>,
}

impl ProcessedAgentDataRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persists one record and returns it with its assigned id.
    ///
    /// `road_state` is validated before the database is touched, so a rejected
    /// record never leaves a partial row behind.
    pub async fn insert(&self, record: NewProcessedAgentRecord) -> Result<Model, RepositoryError> {
        let active = record.into_active_model().inspect_err(|_| {
            counter!("processed_agent_data_validation_failures_total").increment(1);
        })?;

        let started = Instant::now();
        let model = active
            .insert(&*self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        histogram!("processed_agent_data_insert_latency_ms")
            .record(started.elapsed().as_secs_f64() * 1_000.0);
        counter!("processed_agent_data_inserted_total").increment(1);

        debug!(
            id = model.id,
            road_state = %model.road_state,
            user_id = ?model.user_id,
            "Inserted processed agent data"
        );

        Ok(model)
    }

    /// Persists several records in one transaction.
    ///
    /// Every record is validated first; if any is invalid nothing is written and
    /// the error names the offending position.
    pub async fn insert_many(
        &self,
        records: Vec<NewProcessedAgentRecord>,
    ) -> Result<Vec<Model>, RepositoryError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut active_models = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match record.into_active_model() {
                Ok(active) => active_models.push(active),
                Err(RepositoryError::Validation(message)) => {
                    counter!("processed_agent_data_validation_failures_total").increment(1);
                    return Err(RepositoryError::Validation(format!(
                        "record {index}: {message}"
                    )));
                }
                Err(other) => return Err(other),
            }
        }

        let started = Instant::now();
        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        let mut inserted = Vec::with_capacity(active_models.len());
        for active in active_models {
            let model = active
                .insert(&txn)
                .await
                .map_err(RepositoryError::database_error)?;
            inserted.push(model);
        }

        txn.commit()
            .await
            .map_err(RepositoryError::database_error)?;

        histogram!("processed_agent_data_insert_latency_ms")
            .record(started.elapsed().as_secs_f64() * 1_000.0);
        counter!("processed_agent_data_inserted_total").increment(inserted.len() as u64);
        info!(count = inserted.len(), "Inserted processed agent data batch");

        Ok(inserted)
    }

    /// Fetches one record by id, failing with `NotFound` if it does not exist.
    pub async fn get_by_id(&self, id: i32) -> Result<Model, RepositoryError> {
        ProcessedAgentData::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| not_found(id))
    }

    /// Lists one page of records matching `query`.
    ///
    /// Fetches one row past the limit to decide whether another page exists.
    pub async fn list(&self, query: &ListQuery) -> Result<Page, RepositoryError> {
        query.validate()?;

        let mut records = query
            .select()
            .limit(query.limit.saturating_add(1))
            .all(&*self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        let next_cursor = if records.len() as u64 > query.limit {
            records.truncate(query.limit as usize);
            records.last().map(|record| record.id)
        } else {
            None
        };

        Ok(Page {
            records,
            next_cursor,
        })
    }

    /// Returns a lazy page sequence over every record matching `query`.
    pub fn scan(&self, query: ListQuery) -> RecordScan {
        RecordScan::new(self.clone(), query)
    }

    /// Counts records matching `filter`.
    pub async fn count(&self, filter: &RecordFilter) -> Result<u64, RepositoryError> {
        filter.validate()?;

        ProcessedAgentData::find()
            .filter(filter.condition())
            .count(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Removes a record and returns it as it was just before removal.
    pub async fn delete(&self, id: i32) -> Result<Model, RepositoryError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        let existing = ProcessedAgentData::find_by_id(id)
            .one(&txn)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| not_found(id))?;

        let result = existing
            .clone()
            .delete(&txn)
            .await
            .map_err(RepositoryError::database_error)?;

        if result.rows_affected == 0 {
            return Err(not_found(id));
        }

        txn.commit()
            .await
            .map_err(RepositoryError::database_error)?;

        counter!("processed_agent_data_deleted_total").increment(1);
        info!(id, "Deleted processed agent data");

        Ok(existing)
    }
}

fn not_found(id: i32) -> RepositoryError {
    RepositoryError::NotFound(format!("processed agent data {id} not found"))
}

/// Finite, restartable walk over the pages of a listing.
///
/// Pages are fetched on demand. A scan restarted from the same position yields
/// the same records as long as no writes happened in between.
#[derive(Debug, Clone)]
pub struct RecordScan {
    repo: ProcessedAgentDataRepository,
    query: ListQuery,
    start: Option<i32>,
    exhausted: bool,
}

impl RecordScan {
    fn new(repo: ProcessedAgentDataRepository, query: ListQuery) -> Self {
        let start = query.after;
        Self {
            repo,
            query,
            start,
            exhausted: false,
        }
    }

    /// Fetches the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Model>>, RepositoryError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self.repo.list(&self.query).await?;

        match page.next_cursor {
            Some(cursor) => self.query.after = Some(cursor),
            None => self.exhausted = true,
        }

        if page.records.is_empty() {
            return Ok(None);
        }

        Ok(Some(page.records))
    }

    /// Rewinds to the position the scan was created with.
    pub fn restart(&mut self) {
        self.query.after = self.start;
        self.exhausted = false;
    }

    /// Position the next page will start after; `None` means the beginning.
    pub fn cursor(&self) -> Option<i32> {
        self.query.after
    }

    /// Drains the remaining pages into one vector.
    pub async fn collect_all(&mut self) -> Result<Vec<Model>, RepositoryError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}
