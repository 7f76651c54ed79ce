//! History ledger helpers: newest-first, capped at 50 records.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::{FoodImpact, ScanRecord};

pub const HISTORY_CAP: usize = 50;

/// Icon shown for scans that had no photo (text and search inputs).
pub const PLACEHOLDER_IMAGE: &str = "https://img.icons8.com/ios-filled/100/3b82f6/restaurant.png";

/// Where a scan came from; decides the stored image string.
#[derive(Debug, Clone)]
pub enum ScanSource {
    Photo(Bytes),
    Search,
    Text,
}

impl ScanSource {
    fn render(&self) -> String {
        match self {
            ScanSource::Photo(bytes) => {
                format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
            }
            ScanSource::Search | ScanSource::Text => PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

/// Builds a record with a fresh time-derived id. A uuid suffix keeps ids
/// unique when two scans land in the same millisecond.
pub fn new_record(impact: FoodImpact, source: &ScanSource) -> ScanRecord {
    let millis = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    ScanRecord {
        id: format!("{millis}-{}", Uuid::new_v4().simple()),
        timestamp: millis,
        image: source.render(),
        data: impact,
    }
}

/// Prepends the record and truncates to the cap.
pub fn push_capped(history: &mut Vec<ScanRecord>, record: ScanRecord) {
    history.insert(0, record);
    history.truncate(HISTORY_CAP);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GlucosePoint, RiskLevel, ScanType};

    fn impact(name: &str) -> FoodImpact {
        FoodImpact {
            name: name.into(),
            portion: "1 serving".into(),
            calories: 300.0,
            carbs: 40.0,
            gi: 55.0,
            estimated_spike: 30.0,
            risk_level: RiskLevel::Low,
            summary: "ok".into(),
            glucose_curve: vec![GlucosePoint { time: 0, value: 110.0 }],
            scan_type: Some(ScanType::Food),
        }
    }

    #[test]
    fn newest_record_is_first_and_cap_holds() {
        let mut history = Vec::new();
        for i in 0..60 {
            push_capped(&mut history, new_record(impact(&format!("food-{i}")), &ScanSource::Search));
        }
        assert_eq!(history.len(), HISTORY_CAP);
        assert_eq!(history[0].data.name, "food-59");
        assert_eq!(history[HISTORY_CAP - 1].data.name, "food-10");
    }

    #[test]
    fn photo_sources_become_data_uris() {
        let record = new_record(impact("Pizza"), &ScanSource::Photo(Bytes::from_static(b"\xff\xd8")));
        assert!(record.image.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn non_photo_sources_use_the_placeholder_icon() {
        let record = new_record(impact("Sushi"), &ScanSource::Text);
        assert_eq!(record.image, PLACEHOLDER_IMAGE);
    }

    #[test]
    fn record_ids_are_unique_within_a_millisecond() {
        let a = new_record(impact("a"), &ScanSource::Search);
        let b = new_record(impact("b"), &ScanSource::Search);
        assert_ne!(a.id, b.id);
    }
}
