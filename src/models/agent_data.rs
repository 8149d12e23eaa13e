//! Nested reading envelope submitted by the ingestion pipeline.
//!
//! The pipeline posts a classified reading as `{road_state, agent_data: {...}}`
//! with the raw sensor values grouped by device. Storage keeps the flat shape,
//! so the envelope is only an input format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::processed_agent_data::NewProcessedAgentRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccelerometerData {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GpsData {
    pub latitude: f64,
    pub longitude: f64,
}

/// Raw readings from a single agent at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AgentData {
    pub user_id: i32,
    pub accelerometer: AccelerometerData,
    pub gps: GpsData,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    #[schema(example = "2024-01-01T00:00:00Z")]
    pub timestamp: DateTime<Utc>,
}

/// Agent readings together with the road-surface classification computed for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcessedAgentData {
    #[schema(example = "smooth")]
    pub road_state: String,
    pub agent_data: AgentData,
}

impl From<ProcessedAgentData> for NewProcessedAgentRecord {
    fn from(data: ProcessedAgentData) -> Self {
        let AgentData {
            user_id,
            accelerometer,
            gps,
            timestamp,
        } = data.agent_data;

        NewProcessedAgentRecord::new(data.road_state)
            .with_user_id(user_id)
            .with_acceleration(accelerometer.x, accelerometer.y, accelerometer.z)
            .with_location(gps.latitude, gps.longitude)
            .with_timestamp(timestamp)
    }
}
