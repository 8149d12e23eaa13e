//! Processed agent data entity model
//!
//! This module contains the SeaORM entity for the `processed_agent_data` table
//! and the API-facing views of a record: [`ProcessedAgentRecord`] for stored rows
//! and [`NewProcessedAgentRecord`] for insert input.

use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::RepositoryError;

/// One classified reading submitted by an agent.
///
/// Only `road_state` is required. Every other column is nullable and `None`
/// means the agent did not report that value.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "processed_agent_data")]
pub struct Model {
    /// Storage-assigned identifier (serial primary key)
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Road-surface classification, e.g. "smooth" or "pothole"
    pub road_state: String,

    /// Agent/user that submitted the reading (not enforced against any users table)
    pub user_id: Option<i32>,

    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Time of the reading, stored as UTC without a zone
    pub timestamp: Option<NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// A stored record as returned by the API.
///
/// Absent values serialize as `null`; they are never replaced with zero or an
/// empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcessedAgentRecord {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "smooth")]
    pub road_state: String,
    #[schema(example = 7)]
    pub user_id: Option<i32>,
    #[schema(example = 0.12)]
    pub x: Option<f64>,
    #[schema(example = -0.03)]
    pub y: Option<f64>,
    #[schema(example = 9.81)]
    pub z: Option<f64>,
    #[schema(example = 37.77)]
    pub latitude: Option<f64>,
    #[schema(example = -122.41)]
    pub longitude: Option<f64>,
    #[schema(example = "2024-01-01T00:00:00Z")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<Model> for ProcessedAgentRecord {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            road_state: model.road_state,
            user_id: model.user_id,
            x: model.x,
            y: model.y,
            z: model.z,
            latitude: model.latitude,
            longitude: model.longitude,
            timestamp: model.timestamp.map(|naive| naive.and_utc()),
        }
    }
}

/// Insert input for a single record. The identifier is always assigned by storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewProcessedAgentRecord {
    /// Required and non-empty; optional here so that a missing value is reported
    /// as a validation failure rather than a malformed body
    #[serde(default)]
    #[schema(example = "smooth")]
    pub road_state: Option<String>,
    #[serde(default)]
    #[schema(example = 7)]
    pub user_id: Option<i32>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// ISO-8601; values without an offset are read as UTC
    #[serde(default, deserialize_with = "super::timestamp::deserialize_option")]
    #[schema(example = "2024-01-01T00:00:00Z")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewProcessedAgentRecord {
    /// Starts a record carrying only a classification.
    pub fn new(road_state: impl Into<String>) -> Self {
        Self {
            road_state: Some(road_state.into()),
            ..Default::default()
        }
    }

    pub fn with_user_id(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_acceleration(mut self, x: f64, y: f64, z: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self.z = Some(z);
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Checks the only structural rule on input: a present, non-blank `road_state`.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        match self.road_state.as_deref() {
            None => Err(RepositoryError::Validation(
                "road_state is required".to_string(),
            )),
            Some(state) if state.trim().is_empty() => Err(RepositoryError::Validation(
                "road_state must not be empty".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Validates and converts into an active model with the primary key left unset.
    pub fn into_active_model(self) -> Result<ActiveModel, RepositoryError> {
        self.validate()?;

        let road_state = self.road_state.unwrap_or_default();

        Ok(ActiveModel {
            id: NotSet,
            road_state: Set(road_state),
            user_id: Set(self.user_id),
            x: Set(self.x),
            y: Set(self.y),
            z: Set(self.z),
            latitude: Set(self.latitude),
            longitude: Set(self.longitude),
            timestamp: Set(self.timestamp.map(|ts| ts.naive_utc())),
        })
    }
}
