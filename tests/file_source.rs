use std::fs;
use std::path::Path;

use quakeview::error::LoadError;
use quakeview::time::{parse_instant, TimeRange};
use quakeview::views::{self, ReportFilter};
use quakeview::{Category, DataStore, LocationId, RecordKind, StoreConfig};

const GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"loc": 1, "locName": "Palace Hills"},
     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
    {"type": "Feature", "properties": {"loc": "2"},
     "geometry": {"type": "Polygon", "coordinates": [[[2,0],[4,0],[4,2],[2,2],[2,0]]]}}
  ]
}"#;

const NAMES: &str = r#"[{"id": 1, "name": "Palace Hills"}, {"id": "2", "name": "Northwest"}]"#;

const REPORTS: &str = "\
time,location,shake_intensity,power,power_certainty
2020-04-06 00:35:00,1,6,2.5,0.7
2020-04-06 01:10:00,2,,4,
2020-04-06 01:20:00,,3,3,
";

const BSTS: &str = r#"[
  {"location": 1, "category": "power", "time": "2020-04-06 01:00:00", "map": 3.1, "cir": 0.8},
  {"loc": "1", "category": "Shake Intensity", "dateHour": "2020-04-06T02:00:00Z", "MAP": 7.0, "SD": 0.5},
  {"location": 2, "category": "volcano", "time": "2020-04-06 01:00:00", "map": 1.0}
]"#;

const AGGREGATED: &str = "\
location,category,dateHour,map,CIRatMaxMAP
1,power,2020-04-06 02:00:00,3.5,1.0
1,power,2020-04-06 01:00:00,3.0,2.0
1,power,2020-04-06 03:00:00,NA,
";

fn write_dataset(dir: &Path) {
    fs::write(dir.join("neighborhoods.geojson"), GEOJSON).unwrap();
    fs::write(dir.join("neighborhood_map.json"), NAMES).unwrap();
    fs::write(dir.join("reports.csv"), REPORTS).unwrap();
    fs::write(dir.join("bsts_summaries.json"), BSTS).unwrap();
    fs::write(dir.join("summary_aggregated.csv"), AGGREGATED).unwrap();
}

fn store_for(dir: &Path) -> DataStore {
    let config = StoreConfig {
        data_dir: dir.to_path_buf(),
        ..StoreConfig::default()
    };
    DataStore::from_config(config.validate().unwrap())
}

#[tokio::test]
async fn loads_a_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let store = store_for(dir.path());

    assert_eq!(
        store.locations().await.unwrap(),
        vec![LocationId::from(1), LocationId::from(2)]
    );
    assert_eq!(store.neighborhood_name(&LocationId::from(2)).await, "Northwest");

    // Two wide rows with a location: three readings.
    let reports = store.raw_reports().await.unwrap();
    assert_eq!(reports.len(), 3);

    let series = store
        .aggregated_time_series(&LocationId::from(1), Category::Power)
        .await
        .unwrap();
    assert_eq!(series.len(), 3);
    assert!(series.windows(2).all(|w| w[0].time <= w[1].time));
}

#[tokio::test]
async fn views_over_file_data() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    let store = store_for(dir.path());
    let time = parse_instant("2020-04-06 01:30").unwrap();

    let map = views::map_view(&store, Category::Power, Some(time)).await.unwrap();
    let one = map.get(&LocationId::from(1)).unwrap();
    assert_eq!(one.source, Some(RecordKind::Model));
    assert!((one.estimate.value - 3.1).abs() < 1e-9);
    let two = map.get(&LocationId::from(2)).unwrap();
    assert_eq!(two.source, Some(RecordKind::Raw));
    assert_eq!(two.name, "Northwest");

    let later = parse_instant("2020-04-06 02:30").unwrap();
    let snapshot = views::neighborhood_snapshot(&store, &LocationId::from(1), later)
        .await
        .unwrap();
    let shake = snapshot.category(Category::ShakeIntensity).unwrap();
    assert!((shake.estimate.value - 7.0).abs() < 1e-9);
    assert_eq!(shake.latest_report, parse_instant("2020-04-06 00:35"));

    let forecast = views::forecast_window(&store, &LocationId::from(1), Category::Power, None)
        .await
        .unwrap();
    assert_eq!(forecast.len(), 3);
    assert!((forecast[0].ci_lower - 2.0).abs() < 1e-9);
    assert!((forecast[0].ci_upper - 4.0).abs() < 1e-9);
    assert!(forecast[2].value.abs() < f64::EPSILON);

    let window = TimeRange::new(
        parse_instant("2020-04-06 01:00").unwrap(),
        parse_instant("2020-04-06 02:00").unwrap(),
    );
    let filter = ReportFilter::new().category(Category::Power).range(window);
    let reports = views::filtered_reports(&store, &filter).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].location, LocationId::from(2));
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    fs::remove_file(dir.path().join("bsts_summaries.json")).unwrap();
    let store = store_for(dir.path());

    let err = store.bsts_snapshot(None, None).await.unwrap_err();
    match err {
        quakeview::QuakeError::Load(LoadError::Io { path, .. }) => {
            assert!(path.ends_with("bsts_summaries.json"));
        }
        other => panic!("expected io error, got {other:?}"),
    }

    // The file can appear later; the failed load was not cached.
    fs::write(dir.path().join("bsts_summaries.json"), BSTS).unwrap();
    assert_eq!(store.bsts_snapshot(None, None).await.unwrap().location_count(), 1);
}

#[tokio::test]
async fn malformed_neighborhood_map_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    fs::write(dir.path().join("neighborhood_map.json"), "{ not json").unwrap();
    let store = store_for(dir.path());

    assert_eq!(store.neighborhood_name(&LocationId::from(2)).await, "Northwest");
    assert_eq!(store.neighborhood_names().await.len(), 19);
}
