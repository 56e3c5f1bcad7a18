// tests/normalize_fixtures.rs
//
// Shape-invariance checks against captured API pages: whatever the upstream
// shape, the facts that come out carry the same four-field schema with the
// semantically matching values.

use serde_json::Value;

use openaq_ingest::fact::{default_tracked_set, Fact};
use openaq_ingest::normalize::normalize;

fn results(fixture: &str) -> Vec<Value> {
    let page: Value = serde_json::from_str(fixture).expect("fixture json");
    page["results"].as_array().expect("results array").clone()
}

#[test]
fn latest_page_normalizes_complete_rows_with_swept_parameter() {
    let tracked = default_tracked_set();
    let rows = results(include_str!("fixtures/latest_page.json"));

    let facts: Vec<Fact> = rows.iter().flat_map(|r| normalize(r, 2, &tracked)).collect();

    // Third row has a null locationsId and is dropped.
    assert_eq!(facts.len(), 2);
    assert_eq!(facts[0].location_id, 2178);
    assert_eq!(facts[0].parameter_id, 2);
    assert_eq!(facts[0].value, 14.2);
    assert_eq!(facts[0].timestamp, "2024-05-01T10:00:00Z");
    assert_eq!(facts[1].location_id, 2183);
}

#[test]
fn locations_page_emits_per_sensor_facts_with_sensor_parameters() {
    let tracked = default_tracked_set();
    let rows = results(include_str!("fixtures/locations_page.json"));

    let facts: Vec<Fact> = rows.iter().flat_map(|r| normalize(r, 2, &tracked)).collect();

    // Station 2178 has three sensors, one without `latest`; station 3051 has
    // none (and a null country, which must not panic).
    assert_eq!(facts.len(), 2);
    assert!(facts.iter().all(|f| f.location_id == 2178));
    let mut parameter_ids: Vec<i64> = facts.iter().map(|f| f.parameter_id).collect();
    parameter_ids.sort_unstable();
    assert_eq!(parameter_ids, vec![1, 2]);
}

#[test]
fn measurements_page_resolves_parameter_names() {
    let tracked = default_tracked_set();
    let rows = results(include_str!("fixtures/measurements_page.json"));

    let facts: Vec<Fact> = rows.iter().flat_map(|r| normalize(r, 6, &tracked)).collect();

    // "bc" is not tracked; the pm25 and o3 rows survive, coordinates or not.
    assert_eq!(facts.len(), 2);
    assert_eq!(facts[0].parameter_id, 2);
    assert_eq!(facts[0].location_id, 2178);
    assert_eq!(facts[1].parameter_id, 6);
    assert_eq!(facts[1].value, 41.3);
}
