//! File-backed dataset source.
//!
//! Reads a data directory laid out as configured in
//! [`DatasetFiles`](super::config::DatasetFiles). Parsing is split from I/O so
//! each format can be tested from strings.
//!
//! Raw reports come in two CSV layouts:
//! - long: one report per row with `time,location,category,value,...`
//! - wide: `time,location` plus one value column per category, with optional
//!   `<category>_cir`, `<category>_certainty`, `<category>_certainty_level`
//!   and `<category>_ci_lower` / `<category>_ci_upper` columns
//!
//! A `.json` raw-report file is read as an array of long rows instead.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::error::{Dataset, LoadError};
use crate::record::{
    identify, AggregatedPoint, BstsRow, BstsSummary, RawReport, RawReportRow, Reading, RowRejection,
};
use crate::store::config::StoreConfig;
use crate::store::geography::{parse_neighborhood_map, Geography, NeighborhoodName};
use crate::store::source::DatasetSource;

/// Records parsed from one dataset plus the rows that were dropped.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    /// Rows that produced a record, in file order.
    pub records: Vec<T>,
    /// Rows dropped for a missing location, category or time.
    pub skipped: usize,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

impl<T> Parsed<T> {
    fn push(&mut self, row: Result<T, RowRejection>) {
        match row {
            Ok(record) => self.records.push(record),
            Err(reason) => {
                debug!(reason = reason.as_str(), "skipping row");
                self.skipped += 1;
            }
        }
    }
}

/// Header lookup for a CSV file.
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn find(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.index.get(*n).copied())
    }

    fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

fn cell<'r>(record: &'r StringRecord, column: Option<usize>) -> &'r str {
    column.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn text(cell: &str) -> serde_json::Value {
    if cell.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::Value::String(cell.to_string())
    }
}

fn label(cell: &str) -> Option<serde_json::Value> {
    (!cell.is_empty()).then(|| serde_json::Value::String(cell.to_string()))
}

fn csv_reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

fn csv_err(dataset: Dataset) -> impl Fn(csv::Error) -> LoadError {
    move |e| LoadError::parse(dataset, e.to_string())
}

const LOCATION: &[&str] = &["location", "loc", "neighborhood"];
const TIME: &[&str] = &["time", "timestamp", "dateHour"];

/// Parses raw reports from CSV, detecting the long or wide layout.
///
/// # Errors
///
/// Returns [`LoadError::Parse`] for malformed CSV or a header with neither a
/// `category` column nor any category value column.
pub fn parse_raw_reports_csv(content: &str) -> Result<Parsed<RawReport>, LoadError> {
    let mut reader = csv_reader(content);
    let headers = reader.headers().map_err(csv_err(Dataset::RawReports))?.clone();
    let columns = Columns::new(&headers);

    let wide: Vec<Category> = Category::ALL
        .into_iter()
        .filter(|c| columns.has(c.as_str()))
        .collect();
    if !columns.has("category") && wide.is_empty() {
        return Err(LoadError::parse(
            Dataset::RawReports,
            "header has no category column and no per-category value columns",
        ));
    }

    let mut parsed = Parsed::default();
    let location = columns.find(LOCATION);
    let time = columns.find(TIME);

    if columns.has("category") {
        let category = columns.find(&["category"]);
        let value = columns.find(&["value"]);
        let report_value = columns.find(&["reportValue", "report_value"]);
        let certainty = columns.find(&["certainty"]);
        let level = columns.find(&["certainty_level", "certaintyLevel"]);
        let ci_lower = columns.find(&["ci_lower", "ciLower"]);
        let ci_upper = columns.find(&["ci_upper", "ciUpper"]);
        let ci_lower95 = columns.find(&["ci_lower_95", "ci_lower95"]);
        let ci_upper95 = columns.find(&["ci_upper_95", "ci_upper95"]);
        let cir = columns.find(&["cir", "CIR"]);

        for record in reader.records() {
            let record = record.map_err(csv_err(Dataset::RawReports))?;
            let row = RawReportRow {
                location: text(cell(&record, location)),
                category: text(cell(&record, category)),
                time: text(cell(&record, time)),
                value: Reading::from_cell(cell(&record, value)),
                report_value: Reading::from_cell(cell(&record, report_value)),
                certainty: Reading::from_cell(cell(&record, certainty)),
                certainty_level: label(cell(&record, level)),
                ci_lower: Reading::from_cell(cell(&record, ci_lower)),
                ci_upper: Reading::from_cell(cell(&record, ci_upper)),
                ci_lower95: Reading::from_cell(cell(&record, ci_lower95)),
                ci_upper95: Reading::from_cell(cell(&record, ci_upper95)),
                cir: Reading::from_cell(cell(&record, cir)),
            };
            parsed.push(row.into_report());
        }
        return Ok(parsed);
    }

    let per_category: Vec<(Category, WideColumns)> = wide
        .into_iter()
        .map(|c| (c, WideColumns::find(&columns, c)))
        .collect();

    for record in reader.records() {
        let record = record.map_err(csv_err(Dataset::RawReports))?;
        let location = text(cell(&record, location));
        let time = text(cell(&record, time));
        for (category, cols) in &per_category {
            let value = Reading::from_cell(cell(&record, Some(cols.value)));
            if value.is_absent() {
                continue;
            }
            let row = RawReportRow {
                location: location.clone(),
                category: serde_json::Value::String(category.as_str().to_string()),
                time: time.clone(),
                value,
                certainty: Reading::from_cell(cell(&record, cols.certainty)),
                certainty_level: label(cell(&record, cols.level)),
                ci_lower: Reading::from_cell(cell(&record, cols.ci_lower)),
                ci_upper: Reading::from_cell(cell(&record, cols.ci_upper)),
                cir: Reading::from_cell(cell(&record, cols.cir)),
                ..RawReportRow::default()
            };
            parsed.push(row.into_report());
        }
    }
    Ok(parsed)
}

struct WideColumns {
    value: usize,
    certainty: Option<usize>,
    level: Option<usize>,
    ci_lower: Option<usize>,
    ci_upper: Option<usize>,
    cir: Option<usize>,
}

impl WideColumns {
    fn find(columns: &Columns, category: Category) -> Self {
        let name = category.as_str();
        let suffixed = |suffix: &str| columns.find(&[format!("{name}_{suffix}").as_str()]);
        Self {
            value: columns.find(&[name]).unwrap_or_default(),
            certainty: suffixed("certainty"),
            level: suffixed("certainty_level"),
            ci_lower: suffixed("ci_lower"),
            ci_upper: suffixed("ci_upper"),
            cir: suffixed("cir"),
        }
    }
}

/// Parses raw reports from a JSON array of long rows.
///
/// # Errors
///
/// Returns [`LoadError::Parse`] when the document is not an array of objects.
pub fn parse_raw_reports_json(content: &str) -> Result<Parsed<RawReport>, LoadError> {
    let rows: Vec<RawReportRow> = serde_json::from_str(content)
        .map_err(|e| LoadError::parse(Dataset::RawReports, e.to_string()))?;
    let mut parsed = Parsed::default();
    for row in rows {
        parsed.push(row.into_report());
    }
    Ok(parsed)
}

/// Parses BSTS summaries from a JSON array.
///
/// # Errors
///
/// Returns [`LoadError::Parse`] when the document is not an array of objects.
pub fn parse_bsts_json(content: &str) -> Result<Parsed<BstsSummary>, LoadError> {
    let rows: Vec<BstsRow> = serde_json::from_str(content)
        .map_err(|e| LoadError::parse(Dataset::BstsSummaries, e.to_string()))?;
    let mut parsed = Parsed::default();
    for row in rows {
        parsed.push(row.into_summary());
    }
    Ok(parsed)
}

/// Parses the aggregated series CSV
/// (`location,category,dateHour,map,CIRatMaxMAP`).
///
/// # Errors
///
/// Returns [`LoadError::Parse`] for malformed CSV.
pub fn parse_aggregated_csv(content: &str) -> Result<Parsed<AggregatedPoint>, LoadError> {
    let mut reader = csv_reader(content);
    let headers = reader.headers().map_err(csv_err(Dataset::AggregatedSeries))?.clone();
    let columns = Columns::new(&headers);
    let location = columns.find(LOCATION);
    let category = columns.find(&["category"]);
    let time = columns.find(TIME);
    let map = columns.find(&["map", "MAP"]);
    let cir = columns.find(&["CIRatMaxMAP", "cir", "CIR"]);

    let mut parsed = Parsed::default();
    for record in reader.records() {
        let record = record.map_err(csv_err(Dataset::AggregatedSeries))?;
        let point = identify(
            &text(cell(&record, location)),
            &text(cell(&record, category)),
            &text(cell(&record, time)),
        )
        .map(|(location, category, time)| AggregatedPoint {
            time,
            location,
            category,
            map: Reading::from_cell(cell(&record, map)),
            cir: Reading::from_cell(cell(&record, cir)),
        });
        parsed.push(point);
    }
    Ok(parsed)
}

/// Reads datasets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    config: StoreConfig,
}

impl FileSource {
    /// Creates a source reading the files named by `config`.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn read(&self, dataset: Dataset, file: &str) -> Result<String, LoadError> {
        let path: PathBuf = self.config.path_of(file);
        debug!(dataset = dataset.as_str(), path = %path.display(), "reading dataset");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| LoadError::Io {
                dataset,
                path,
                source,
            })
    }
}

fn report<T>(dataset: Dataset, parsed: Parsed<T>) -> Vec<T> {
    if parsed.skipped > 0 {
        warn!(
            dataset = dataset.as_str(),
            skipped = parsed.skipped,
            "skipped rows without a usable location, category or time"
        );
    }
    info!(dataset = dataset.as_str(), rows = parsed.records.len(), "dataset parsed");
    parsed.records
}

#[async_trait]
impl DatasetSource for FileSource {
    async fn geography(&self) -> Result<Geography, LoadError> {
        let content = self.read(Dataset::Geography, &self.config.files.geography).await?;
        let geography = Geography::from_geojson_str(&content)?;
        info!(dataset = "geography", features = geography.len(), "dataset parsed");
        Ok(geography)
    }

    async fn neighborhood_map(&self) -> Result<Vec<NeighborhoodName>, LoadError> {
        let content = self
            .read(Dataset::NeighborhoodMap, &self.config.files.neighborhood_map)
            .await?;
        parse_neighborhood_map(&content)
    }

    async fn raw_reports(&self) -> Result<Vec<RawReport>, LoadError> {
        let file = &self.config.files.raw_reports;
        let content = self.read(Dataset::RawReports, file).await?;
        let parsed = if file.to_ascii_lowercase().ends_with(".json") {
            parse_raw_reports_json(&content)?
        } else {
            parse_raw_reports_csv(&content)?
        };
        Ok(report(Dataset::RawReports, parsed))
    }

    async fn bsts_summaries(&self) -> Result<Vec<BstsSummary>, LoadError> {
        let content = self
            .read(Dataset::BstsSummaries, &self.config.files.bsts_summaries)
            .await?;
        Ok(report(Dataset::BstsSummaries, parse_bsts_json(&content)?))
    }

    async fn aggregated_series(&self) -> Result<Vec<AggregatedPoint>, LoadError> {
        let content = self
            .read(Dataset::AggregatedSeries, &self.config.files.aggregated_series)
            .await?;
        Ok(report(Dataset::AggregatedSeries, parse_aggregated_csv(&content)?))
    }

    fn name(&self) -> &str {
        "file"
    }
}
