//! Configuration API endpoint.
//!
//! The kiosk front end reads the class list on load to populate its class
//! picker. Rosters are not exposed here.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Creates the config router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/config", get(get_config))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A class as shown to the front end.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "P3",
    "name": "Period 3 Biology"
}))]
pub struct ClassSummary {
    /// Class id sent back as `classId`.
    #[schema(example = "P3")]
    pub id: String,

    /// Display name.
    #[schema(example = "Period 3 Biology")]
    pub name: String,
}

/// Current configuration response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "classes": [{ "id": "P3", "name": "Period 3 Biology" }],
    "defaultClass": "P3",
    "timezone": "America/Chicago",
    "defaultExpectedMinutes": 10
}))]
pub struct ConfigResponse {
    /// Configured classes in display order.
    pub classes: Vec<ClassSummary>,

    /// Class used when a request omits `classId`.
    #[schema(example = "P3")]
    pub default_class: String,

    /// Timezone that defines the attendance day (IANA format).
    #[schema(example = "America/Chicago")]
    pub timezone: String,

    /// Expected duration applied to checkouts that do not give one.
    #[schema(example = 10)]
    pub default_expected_minutes: Option<u32>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get the class configuration.
#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    operation_id = "getConfig",
    summary = "Get class configuration",
    description = "Returns the configured classes and the default class id.",
    responses(
        (status = 200, description = "Configuration retrieved", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let config = &state.config;

    Json(ConfigResponse {
        classes: config
            .classes
            .iter()
            .map(|c| ClassSummary {
                id: c.id.clone(),
                name: c.name.clone(),
            })
            .collect(),
        default_class: config.default_class_id().to_string(),
        timezone: config.attendance.timezone.clone(),
        default_expected_minutes: config.passes.default_expected_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_response_uses_camel_case() {
        let response = ConfigResponse {
            classes: vec![ClassSummary {
                id: "P3".to_string(),
                name: "Period 3".to_string(),
            }],
            default_class: "P3".to_string(),
            timezone: "America/Chicago".to_string(),
            default_expected_minutes: Some(10),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["defaultClass"], "P3");
        assert_eq!(json["classes"][0]["id"], "P3");
        assert_eq!(json["defaultExpectedMinutes"], 10);
    }
}
