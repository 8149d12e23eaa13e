//! # Data Models
//!
//! This module contains the data models used throughout the roadwatch service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod agent_data;
pub mod processed_agent_data;
pub mod timestamp;

pub use agent_data::{AccelerometerData, AgentData, GpsData, ProcessedAgentData};
pub use processed_agent_data::{
    Entity as ProcessedAgentDataEntity, NewProcessedAgentRecord, ProcessedAgentRecord,
};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "roadwatch".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health probe response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    /// `ok` when the probe passed
    #[schema(example = "ok")]
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
