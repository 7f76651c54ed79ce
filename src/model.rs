//! Domain types shared across the store. Serialized field names keep the
//! camelCase shape of the persisted JSON.

use serde::{Deserialize, Serialize};

/// UI-enforced bounds for the numeric profile fields.
pub const HBA1C_RANGE: (f64, f64) = (4.0, 14.0);
pub const FASTING_RANGE: (u32, u32) = (60, 300);
pub const POST_MEAL_RANGE: (u32, u32) = (120, 250);

/// Personal metabolic profile. `conditions` keeps insertion order for
/// display and never holds duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub hb_a1c: f64,
    pub fasting_blood_sugar: u32,
    pub target_post_meal: u32,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            hb_a1c: 6.5,
            fasting_blood_sugar: 110,
            target_post_meal: 160,
            conditions: Vec::new(),
        }
    }
}

/// Partial profile update; unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub hb_a1c: Option<f64>,
    pub fasting_blood_sugar: Option<u32>,
    pub target_post_meal: Option<u32>,
    pub conditions: Option<Vec<String>>,
}

impl UserProfile {
    /// Shallow field-level merge, last write wins. Numeric fields are
    /// clamped to the UI ranges and conditions are deduplicated in
    /// insertion order.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(v) = update.hb_a1c {
            self.hb_a1c = v.clamp(HBA1C_RANGE.0, HBA1C_RANGE.1);
        }
        if let Some(v) = update.fasting_blood_sugar {
            self.fasting_blood_sugar = v.clamp(FASTING_RANGE.0, FASTING_RANGE.1);
        }
        if let Some(v) = update.target_post_meal {
            self.target_post_meal = v.clamp(POST_MEAL_RANGE.0, POST_MEAL_RANGE.1);
        }
        if let Some(v) = update.conditions {
            self.conditions = dedup_in_order(v);
        }
    }

    /// Adds the condition if absent, removes it if present.
    pub fn toggle_condition(&mut self, condition_id: &str) {
        if let Some(pos) = self.conditions.iter().position(|c| c == condition_id) {
            self.conditions.remove(pos);
        } else {
            self.conditions.push(condition_id.to_string());
        }
    }
}

fn dedup_in_order(conditions: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(conditions.len());
    for c in conditions {
        if !seen.contains(&c) {
            seen.push(c);
        }
    }
    seen
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Food,
    Recipe,
}

/// One point of the simulated glucose curve, minutes after consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucosePoint {
    pub time: u32,
    pub value: f64,
}

/// Output of the analysis capability. Immutable locally except for a
/// whole-object replacement when the displayed copy is re-translated;
/// translation touches only `name`, `portion` and `summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodImpact {
    pub name: String,
    pub portion: String,
    pub calories: f64,
    pub carbs: f64,
    pub gi: f64,
    pub estimated_spike: f64,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub glucose_curve: Vec<GlucosePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<ScanType>,
}

/// One entry of the history ledger. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Data URI of the captured photo, or a placeholder icon reference
    /// for text and search inputs.
    pub image: String,
    pub data: FoodImpact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    pub calories: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRecommendation {
    #[serde(rename = "type")]
    pub meal_type: MealType,
    pub name: String,
    pub description: String,
    pub why_good: String,
    pub nutrients: Nutrients,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_merges_field_by_field() {
        let mut profile = UserProfile::default();
        profile.apply(ProfileUpdate {
            hb_a1c: Some(7.2),
            ..Default::default()
        });
        profile.apply(ProfileUpdate {
            fasting_blood_sugar: Some(120),
            ..Default::default()
        });
        assert_eq!(profile.hb_a1c, 7.2);
        assert_eq!(profile.fasting_blood_sugar, 120);
        assert_eq!(profile.target_post_meal, 160);
    }

    #[test]
    fn apply_clamps_to_ui_ranges() {
        let mut profile = UserProfile::default();
        profile.apply(ProfileUpdate {
            hb_a1c: Some(20.0),
            fasting_blood_sugar: Some(10),
            target_post_meal: Some(500),
            conditions: None,
        });
        assert_eq!(profile.hb_a1c, 14.0);
        assert_eq!(profile.fasting_blood_sugar, 60);
        assert_eq!(profile.target_post_meal, 250);
    }

    #[test]
    fn conditions_are_deduplicated_in_order() {
        let mut profile = UserProfile::default();
        profile.apply(ProfileUpdate {
            conditions: Some(vec![
                "diabetes_t2".into(),
                "obesity".into(),
                "diabetes_t2".into(),
            ]),
            ..Default::default()
        });
        assert_eq!(profile.conditions, vec!["diabetes_t2", "obesity"]);
    }

    #[test]
    fn toggle_condition_adds_then_removes() {
        let mut profile = UserProfile::default();
        profile.toggle_condition("pcos");
        profile.toggle_condition("kidney");
        assert_eq!(profile.conditions, vec!["pcos", "kidney"]);
        profile.toggle_condition("pcos");
        assert_eq!(profile.conditions, vec!["kidney"]);
    }

    #[test]
    fn food_impact_uses_camel_case_keys() {
        let impact = FoodImpact {
            name: "Bibimbap".into(),
            portion: "1 bowl".into(),
            calories: 560.0,
            carbs: 82.0,
            gi: 65.0,
            estimated_spike: 45.0,
            risk_level: RiskLevel::Medium,
            summary: "Moderate spike expected.".into(),
            glucose_curve: vec![GlucosePoint { time: 30, value: 150.0 }],
            scan_type: Some(ScanType::Food),
        };
        let json = serde_json::to_string(&impact).expect("serialize");
        assert!(json.contains("\"estimatedSpike\""));
        assert!(json.contains("\"riskLevel\":\"Medium\""));
        assert!(json.contains("\"glucoseCurve\""));
        assert!(json.contains("\"scanType\":\"food\""));
    }

    #[test]
    fn profile_round_trips_through_json() {
        let mut profile = UserProfile::default();
        profile.toggle_condition("hypertension");
        let json = serde_json::to_string(&profile).expect("serialize");
        assert!(json.contains("\"hbA1c\":6.5"));
        let back: UserProfile = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, profile);
    }
}
