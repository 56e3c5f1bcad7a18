// src/normalize.rs
//
// Maps one raw upstream record onto zero or more canonical facts. The
// upstream API has grown three response shapes over time; a classifier picks
// the variant by probing which discriminating fields are present, and each
// variant normalizes independently. Records missing any of the four canonical
// fields are dropped without error (forward progress over completeness).

use serde::Deserialize;
use serde_json::Value;

use crate::fact::{Fact, TrackedParameter};

#[derive(Debug, Deserialize)]
pub struct UtcStamp {
    pub utc: Option<String>,
}

/// `GET /parameters/{id}/latest` row. Does not self-describe its parameter;
/// the sweep context supplies it.
#[derive(Debug, Deserialize)]
pub struct LatestRow {
    #[serde(rename = "locationsId")]
    pub locations_id: Option<i64>,
    pub value: Option<f64>,
    pub datetime: Option<UtcStamp>,
}

#[derive(Debug, Deserialize)]
pub struct SensorParameter {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub units: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SensorLatest {
    pub value: Option<f64>,
    pub datetime: Option<UtcStamp>,
}

#[derive(Debug, Deserialize)]
pub struct Sensor {
    pub parameter: Option<SensorParameter>,
    pub latest: Option<SensorLatest>,
}

/// `GET /locations` row: one station with embedded sensors, each carrying its
/// own parameter and (possibly) a latest reading.
#[derive(Debug, Deserialize)]
pub struct LocationRow {
    pub id: Option<i64>,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

/// Older flat `GET /measurements` row. `parameter` here is a name, not an id;
/// it resolves against the tracked set. `coordinates` is optional and unused.
#[derive(Debug, Deserialize)]
pub struct MeasurementRow {
    #[serde(rename = "locationId")]
    pub location_id: Option<i64>,
    pub parameter: Option<String>,
    pub value: Option<f64>,
    pub date: Option<UtcStamp>,
}

/// Tagged union over the known upstream shapes.
#[derive(Debug)]
pub enum RawRecord {
    LocationWithSensors(LocationRow),
    LatestByParameter(LatestRow),
    FlatMeasurement(MeasurementRow),
}

/// Decide which shape a raw record is, by probing discriminating fields:
/// a `sensors` list marks a location row, `locationsId` marks a latest row,
/// and a top-level `value` with `locationId` or `date` marks the flat shape.
/// Unrecognized records classify to `None` and are dropped upstream.
pub fn classify(raw: &Value) -> Option<RawRecord> {
    let obj = raw.as_object()?;
    if obj.contains_key("sensors") {
        let row: LocationRow = serde_json::from_value(raw.clone()).ok()?;
        return Some(RawRecord::LocationWithSensors(row));
    }
    if obj.contains_key("locationsId") {
        let row: LatestRow = serde_json::from_value(raw.clone()).ok()?;
        return Some(RawRecord::LatestByParameter(row));
    }
    if obj.contains_key("value") && (obj.contains_key("locationId") || obj.contains_key("date")) {
        let row: MeasurementRow = serde_json::from_value(raw.clone()).ok()?;
        return Some(RawRecord::FlatMeasurement(row));
    }
    None
}

/// Normalize one raw record into canonical facts.
///
/// `swept_parameter` is the id currently being swept; only the
/// latest-by-parameter shape uses it, since that shape does not carry its own
/// parameter. The location shape emits one fact per sensor whose `latest` is
/// present, each with the sensor's own parameter id.
pub fn normalize(raw: &Value, swept_parameter: i64, tracked: &[TrackedParameter]) -> Vec<Fact> {
    let Some(record) = classify(raw) else {
        return Vec::new();
    };

    match record {
        RawRecord::LatestByParameter(row) => gate(
            row.locations_id,
            Some(swept_parameter),
            row.value,
            utc_of(row.datetime),
        )
        .into_iter()
        .collect(),

        RawRecord::LocationWithSensors(row) => {
            let mut out = Vec::new();
            for sensor in row.sensors {
                let Some(latest) = sensor.latest else { continue };
                let parameter_id = sensor.parameter.and_then(|p| p.id);
                if let Some(fact) = gate(row.id, parameter_id, latest.value, utc_of(latest.datetime))
                {
                    out.push(fact);
                }
            }
            out
        }

        RawRecord::FlatMeasurement(row) => {
            let parameter_id = row.parameter.as_deref().and_then(|name| {
                tracked
                    .iter()
                    .find(|p| p.matches_label(name))
                    .map(|p| p.id)
            });
            gate(row.location_id, parameter_id, row.value, utc_of(row.date))
                .into_iter()
                .collect()
        }
    }
}

fn utc_of(stamp: Option<UtcStamp>) -> Option<String> {
    stamp.and_then(|s| s.utc)
}

// Completeness gate: all four fields present AND truthy. Zero-valued
// measurements and a zero location id fall through this gate, matching the
// observed behavior of the system being replaced (see DESIGN.md).
fn gate(
    location_id: Option<i64>,
    parameter_id: Option<i64>,
    value: Option<f64>,
    timestamp: Option<String>,
) -> Option<Fact> {
    let location_id = location_id.filter(|id| *id != 0)?;
    let parameter_id = parameter_id.filter(|id| *id != 0)?;
    let value = value.filter(|v| *v != 0.0)?;
    let timestamp = timestamp.filter(|ts| !ts.is_empty())?;
    Some(Fact {
        location_id,
        parameter_id,
        value,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::default_tracked_set;
    use serde_json::json;

    fn tracked() -> Vec<TrackedParameter> {
        default_tracked_set()
    }

    #[test]
    fn classifies_all_three_shapes() {
        let latest = json!({"locationsId": 5, "value": 1.0, "datetime": {"utc": "x"}});
        let location = json!({"id": 5, "sensors": []});
        let flat = json!({"locationId": 5, "parameter": "pm25", "value": 1.0, "date": {"utc": "x"}});
        assert!(matches!(
            classify(&latest),
            Some(RawRecord::LatestByParameter(_))
        ));
        assert!(matches!(
            classify(&location),
            Some(RawRecord::LocationWithSensors(_))
        ));
        assert!(matches!(
            classify(&flat),
            Some(RawRecord::FlatMeasurement(_))
        ));
        assert!(classify(&json!({"unrelated": true})).is_none());
        assert!(classify(&json!("not an object")).is_none());
    }

    #[test]
    fn latest_shape_takes_parameter_from_sweep_context() {
        let raw = json!({
            "locationsId": 2178,
            "value": 12.4,
            "datetime": {"utc": "2024-05-01T10:00:00Z"}
        });
        let facts = normalize(&raw, 2, &tracked());
        assert_eq!(
            facts,
            vec![Fact {
                location_id: 2178,
                parameter_id: 2,
                value: 12.4,
                timestamp: "2024-05-01T10:00:00Z".to_string(),
            }]
        );
    }

    #[test]
    fn missing_any_canonical_field_yields_no_fact() {
        let complete = json!({
            "locationsId": 1, "value": 3.0, "datetime": {"utc": "2024-05-01T10:00:00Z"}
        });
        assert_eq!(normalize(&complete, 2, &tracked()).len(), 1);

        let no_location = json!({"locationsId": null, "value": 3.0, "datetime": {"utc": "t"}});
        let no_value = json!({"locationsId": 1, "datetime": {"utc": "t"}});
        let no_ts = json!({"locationsId": 1, "value": 3.0});
        let empty_ts = json!({"locationsId": 1, "value": 3.0, "datetime": {"utc": ""}});
        for raw in [no_location, no_value, no_ts, empty_ts] {
            assert!(normalize(&raw, 2, &tracked()).is_empty(), "raw: {raw}");
        }
    }

    #[test]
    fn zero_value_is_rejected() {
        // Pins the all-fields-truthy rule: a legitimate 0.0 reading is dropped.
        // Changing this to "not absent" is a behavior change; see DESIGN.md.
        let raw = json!({
            "locationsId": 1, "value": 0.0, "datetime": {"utc": "2024-05-01T10:00:00Z"}
        });
        assert!(normalize(&raw, 2, &tracked()).is_empty());
    }

    #[test]
    fn location_shape_emits_one_fact_per_sensor_with_latest() {
        let raw = json!({
            "id": 99,
            "name": "Station",
            "country": {"code": "UA"},
            "sensors": [
                {
                    "parameter": {"id": 2, "name": "pm25", "units": "µg/m³"},
                    "latest": {"value": 7.5, "datetime": {"utc": "2024-05-01T10:00:00Z"}}
                },
                {
                    "parameter": {"id": 1, "name": "pm10", "units": "µg/m³"}
                }
            ]
        });
        let facts = normalize(&raw, 2, &tracked());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].location_id, 99);
        assert_eq!(facts[0].parameter_id, 2);
    }

    #[test]
    fn location_shape_uses_sensor_parameter_not_sweep_context() {
        let raw = json!({
            "id": 7,
            "sensors": [{
                "parameter": {"id": 11, "name": "no2", "units": "µg/m³"},
                "latest": {"value": 4.2, "datetime": {"utc": "2024-05-01T10:00:00Z"}}
            }]
        });
        let facts = normalize(&raw, 2, &tracked());
        assert_eq!(facts[0].parameter_id, 11);
    }

    #[test]
    fn flat_shape_resolves_parameter_name_against_tracked_set() {
        let raw = json!({
            "locationId": 42,
            "location": "Kyiv",
            "parameter": "pm25",
            "value": 9.1,
            "unit": "µg/m³",
            "date": {"utc": "2024-05-01T10:00:00Z"}
        });
        let facts = normalize(&raw, 6, &tracked());
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].parameter_id, 2);
    }

    #[test]
    fn flat_shape_missing_coordinates_is_not_a_rejection() {
        let raw = json!({
            "locationId": 42,
            "parameter": "no2",
            "value": 9.1,
            "date": {"utc": "2024-05-01T10:00:00Z"}
        });
        assert_eq!(normalize(&raw, 6, &tracked()).len(), 1);
    }

    #[test]
    fn flat_shape_with_untracked_parameter_name_is_dropped() {
        let raw = json!({
            "locationId": 42,
            "parameter": "bc",
            "value": 9.1,
            "date": {"utc": "2024-05-01T10:00:00Z"}
        });
        assert!(normalize(&raw, 6, &tracked()).is_empty());
    }

    #[test]
    fn malformed_nested_optionals_never_panic() {
        let raw = json!({
            "locationsId": 1,
            "value": 3.0,
            "datetime": null
        });
        assert!(normalize(&raw, 2, &tracked()).is_empty());

        let raw = json!({
            "id": 1,
            "sensors": [{"parameter": null, "latest": null}]
        });
        assert!(normalize(&raw, 2, &tracked()).is_empty());
    }
}
