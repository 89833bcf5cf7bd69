//! User settings stored in the profile metadata blob.
//!
//! The blob is free-form JSON; the typed view below only validates the keys
//! the site knows about. Unknown keys pass through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyStatus {
    EuCitizen,
    NonEuCitizen,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OccupationStatus {
    Student,
    Employed,
    SelfEmployed,
    JobSeeker,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomStep {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapModifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_step_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_steps: Option<Vec<CustomStep>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residency_status: Option<ResidencyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation_status: Option<OccupationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_arrived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roadmap_modifications: Option<RoadmapModifications>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_steps: Option<Vec<String>>,
}

/// Checks that a settings patch is a JSON object whose known keys carry
/// well-typed values, and hands back the raw object for merging.
pub fn validate_patch(value: Value) -> anyhow::Result<Map<String, Value>> {
    let Value::Object(patch) = value else {
        return Err(anyhow::anyhow!("Settings must be a JSON object"));
    };
    serde_json::from_value::<UserSettings>(Value::Object(patch.clone()))
        .map_err(|e| anyhow::anyhow!("Invalid settings: {}", e))?;
    Ok(patch)
}

/// Shallow merge: every key in `patch` replaces the stored key, everything
/// else is kept.
pub fn merge_shallow(existing: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        existing.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_keeps_unspecified_keys() {
        let mut existing = as_map(json!({
            "displayName": "Ana",
            "hasArrived": false,
            "completedSteps": ["cpr"]
        }));

        merge_shallow(&mut existing, as_map(json!({ "hasArrived": true })));

        assert_eq!(existing["displayName"], "Ana");
        assert_eq!(existing["hasArrived"], true);
        assert_eq!(existing["completedSteps"], json!(["cpr"]));
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut existing = as_map(json!({
            "roadmapModifications": { "hiddenStepIds": ["a"], "customSteps": [] }
        }));

        merge_shallow(
            &mut existing,
            as_map(json!({ "roadmapModifications": { "hiddenStepIds": ["b"] } })),
        );

        assert_eq!(existing["roadmapModifications"], json!({ "hiddenStepIds": ["b"] }));
    }

    #[test]
    fn test_validate_accepts_known_and_unknown_keys() {
        let patch = validate_patch(json!({
            "residencyStatus": "non_eu_citizen",
            "occupationStatus": "self_employed",
            "theme": "dark"
        }))
        .unwrap();

        assert_eq!(patch.len(), 3);
        assert_eq!(patch["theme"], "dark");
    }

    #[test]
    fn test_validate_rejects_bad_enum_value() {
        let err = validate_patch(json!({ "residencyStatus": "martian" })).unwrap_err();
        assert!(err.to_string().contains("Invalid settings"));
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert!(validate_patch(json!(["displayName"])).is_err());
        assert!(validate_patch(json!("hello")).is_err());
    }

    #[test]
    fn test_custom_step_shape() {
        let settings: UserSettings = serde_json::from_value(json!({
            "roadmapModifications": {
                "customSteps": [{
                    "id": "bank",
                    "title": "Open a bank account",
                    "description": "NemKonto",
                    "status": "current"
                }]
            }
        }))
        .unwrap();

        let steps = settings.roadmap_modifications.unwrap().custom_steps.unwrap();
        assert_eq!(steps[0].status, StepStatus::Current);
        assert_eq!(steps[0].icon_name, None);
    }
}
