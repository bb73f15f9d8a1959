use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{PowerError, Result};
use crate::query::OutputFormat;

/// Sentinel the service uses for missing source data, in every format.
pub const FILL_VALUE: f64 = -999.0;

/// Marker closing the informational preamble of csv/ascii payloads.
const END_HEADER: &str = "-END HEADER-";
const BEGIN_HEADER: &str = "-BEGIN HEADER-";

/// One table cell: a float for measurements, text where the service emits
/// labels (JSON date keys, the monthly parameter column).
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Float(f64),
    Text(String),
}

impl Datum {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Float(v) => Some(*v),
            Datum::Text(_) => None,
        }
    }

    /// Whether the cell carries the missing-data sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(self, Datum::Float(v) if *v == FILL_VALUE)
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Float(v) => write!(f, "{v}"),
            Datum::Text(s) => f.write_str(s),
        }
    }
}

/// In-memory result table: labeled columns over an ordered sequence of rows.
///
/// Daily and hourly tables are keyed by date (see [`MeteoTable::dates`]);
/// monthly and climatology payloads keep the service's own row layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeteoTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Datum>>,
}

impl MeteoTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The named column as floats; text cells map to the missing sentinel.
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| PowerError::validation(format!("table has no column {name:?}")))?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).and_then(Datum::as_f64).unwrap_or(FILL_VALUE))
            .collect())
    }

    /// The date key of every row.
    ///
    /// Works for tables with `YEAR`/`MO`/`DY` columns (csv/ascii daily and
    /// hourly payloads) and for tables with a `DATE` column holding
    /// `YYYYMMDD`-prefixed keys (flattened JSON payloads).
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        if let (Some(y), Some(m), Some(d)) = (
            self.column_index("YEAR"),
            self.column_index("MO"),
            self.column_index("DY"),
        ) {
            return self
                .rows
                .iter()
                .map(|row| {
                    let year = row.get(y).and_then(Datum::as_f64);
                    let month = row.get(m).and_then(Datum::as_f64);
                    let day = row.get(d).and_then(Datum::as_f64);
                    match (year, month, day) {
                        (Some(year), Some(month), Some(day)) => {
                            NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
                                .ok_or_else(|| {
                                    PowerError::validation(format!(
                                        "row holds no valid date: {year}-{month}-{day}"
                                    ))
                                })
                        }
                        _ => Err(PowerError::validation("row holds no valid date")),
                    }
                })
                .collect();
        }

        if let Some(idx) = self.column_index("DATE") {
            return self
                .rows
                .iter()
                .map(|row| {
                    let key = match row.get(idx) {
                        Some(Datum::Text(s)) => s.clone(),
                        Some(Datum::Float(v)) => format!("{v}"),
                        None => String::new(),
                    };
                    if key.len() < 8 {
                        return Err(PowerError::validation(format!(
                            "date key {key:?} is not YYYYMMDD-prefixed"
                        )));
                    }
                    NaiveDate::parse_from_str(&key[..8], "%Y%m%d").map_err(|_| {
                        PowerError::validation(format!("date key {key:?} is not YYYYMMDD-prefixed"))
                    })
                })
                .collect();
        }

        Err(PowerError::validation(
            "table has neither YEAR/MO/DY nor DATE columns",
        ))
    }

    /// Time-of-day per row for hourly tables, from the `HR` column or the
    /// hour suffix of `DATE` keys. `None` when the table carries no hours.
    pub fn hours(&self) -> Option<Vec<u32>> {
        if let Some(idx) = self.column_index("HR") {
            return Some(
                self.rows
                    .iter()
                    .map(|row| row.get(idx).and_then(Datum::as_f64).unwrap_or(0.0) as u32)
                    .collect(),
            );
        }

        let idx = self.column_index("DATE")?;
        let mut hours = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            match row.get(idx) {
                Some(Datum::Text(s)) if s.len() >= 10 => {
                    hours.push(s[8..10].parse().ok()?);
                }
                _ => return None,
            }
        }
        Some(hours)
    }
}

/// Metadata parsed from the response preamble (csv/ascii) or the JSON
/// header and geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataHeader {
    /// Verbatim preamble text, as received.
    pub raw: String,
    pub title: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub fill_value: Option<f64>,
    /// Parameter code and its description line.
    pub parameters: Vec<(String, String)>,
}

/// Decoded response payload.
#[derive(Debug, Clone)]
pub enum PowerData {
    /// csv/ascii: tabular data with an optional preamble.
    Table {
        metadata: Option<MetadataHeader>,
        table: MeteoTable,
    },
    /// json: the decoded document plus its flattened table view.
    Json {
        metadata: Option<MetadataHeader>,
        table: MeteoTable,
        document: Value,
    },
    /// netcdf: verbatim payload bytes.
    Netcdf { bytes: Vec<u8> },
}

impl PowerData {
    pub fn table(&self) -> Option<&MeteoTable> {
        match self {
            PowerData::Table { table, .. } | PowerData::Json { table, .. } => Some(table),
            PowerData::Netcdf { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&MetadataHeader> {
        match self {
            PowerData::Table { metadata, .. } | PowerData::Json { metadata, .. } => {
                metadata.as_ref()
            }
            PowerData::Netcdf { .. } => None,
        }
    }
}

/// Decodes a response body in the given format.
pub fn parse(body: &[u8], format: OutputFormat) -> Result<PowerData> {
    match format {
        OutputFormat::Csv => parse_delimited(body, format, b','),
        OutputFormat::Ascii => parse_ascii(body),
        OutputFormat::Json => parse_json(body),
        OutputFormat::Netcdf => parse_netcdf(body),
    }
}

fn body_text(body: &[u8], format: OutputFormat) -> Result<&str> {
    std::str::from_utf8(body)
        .map_err(|e| PowerError::format(format, format!("body is not valid UTF-8: {e}")))
}

/// Splits an optional `-BEGIN HEADER- ... -END HEADER-` preamble off the
/// data section.
fn split_preamble(text: &str) -> (Option<&str>, &str) {
    match text.split_once(END_HEADER) {
        Some((header, rest)) => (Some(header), rest),
        None => (None, text),
    }
}

fn parse_delimited(body: &[u8], format: OutputFormat, delimiter: u8) -> Result<PowerData> {
    let text = body_text(body, format)?;
    let (preamble, data) = split_preamble(text);
    let metadata = preamble.map(parse_metadata);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(data.trim_start_matches(['\r', '\n']).as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| PowerError::format(format, e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(PowerError::format(format, "no column header line"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PowerError::format(format, e.to_string()))?;
        rows.push(record.iter().map(parse_cell).collect());
    }
    if rows.is_empty() {
        return Err(PowerError::format(format, "no data rows after header"));
    }

    Ok(PowerData::Table {
        metadata,
        table: MeteoTable { columns, rows },
    })
}

fn parse_ascii(body: &[u8]) -> Result<PowerData> {
    let format = OutputFormat::Ascii;
    let text = body_text(body, format)?;
    let (preamble, data) = split_preamble(text);
    let metadata = preamble.map(parse_metadata);

    let mut lines = data.lines().filter(|l| !l.trim().is_empty());
    let columns: Vec<String> = lines
        .next()
        .ok_or_else(|| PowerError::format(format, "no column header line"))?
        .split_whitespace()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        let row: Vec<Datum> = line.split_whitespace().map(parse_cell).collect();
        if row.len() != columns.len() {
            return Err(PowerError::format(
                format,
                format!(
                    "row has {} fields, header has {} columns",
                    row.len(),
                    columns.len()
                ),
            ));
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(PowerError::format(format, "no data rows after header"));
    }

    Ok(PowerData::Table {
        metadata,
        table: MeteoTable { columns, rows },
    })
}

fn parse_cell(field: &str) -> Datum {
    if field.is_empty() {
        return Datum::Float(FILL_VALUE);
    }
    match field.parse::<f64>() {
        Ok(v) => Datum::Float(v),
        Err(_) => Datum::Text(field.to_string()),
    }
}

/// Extracts what the informational preamble reliably carries: title,
/// coordinates, elevation, fill value, and the parameter description block.
fn parse_metadata(preamble: &str) -> MetadataHeader {
    let mut header = MetadataHeader {
        raw: preamble.to_string(),
        ..Default::default()
    };

    let mut in_parameters = false;
    for raw in preamble.lines() {
        let line = raw.trim();
        if line.is_empty() || line == BEGIN_HEADER {
            continue;
        }

        if in_parameters {
            if let Some((code, description)) = line.split_once(char::is_whitespace) {
                header
                    .parameters
                    .push((code.to_string(), description.trim().to_string()));
            } else {
                header.parameters.push((line.to_string(), String::new()));
            }
            continue;
        }

        if header.title.is_none() {
            header.title = Some(line.to_string());
        }

        if line.contains("Latitude") && line.contains("Longitude") {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            for pair in tokens.windows(2) {
                match pair[0] {
                    "Latitude" => header.latitude = pair[1].parse().ok(),
                    "Longitude" => header.longitude = pair[1].parse().ok(),
                    _ => {}
                }
            }
        } else if line.starts_with("Elevation") {
            if let Some((_, value)) = line.split_once('=') {
                header.elevation = value
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse().ok());
            }
        } else if line.contains("missing source data") {
            if let Some((_, value)) = line.rsplit_once(':') {
                header.fill_value = value.trim().parse().ok();
            }
        } else if line.starts_with("Parameter(s):") {
            in_parameters = true;
        }
    }

    header
}

// The JSON document comes in two shapes: the current API answers with a
// single GeoJSON-like feature at the top level, the original service
// wrapped it in a "features" array.
#[derive(Debug, Deserialize)]
struct PowerDocument {
    #[serde(default)]
    features: Vec<PowerFeature>,
    #[serde(default)]
    geometry: Option<PowerGeometry>,
    #[serde(default)]
    properties: Option<PowerProperties>,
    #[serde(default)]
    header: Option<PowerHeader>,
    #[serde(default)]
    parameters: Option<BTreeMap<String, ParameterMeta>>,
}

#[derive(Debug, Deserialize)]
struct PowerFeature {
    #[serde(default)]
    geometry: Option<PowerGeometry>,
    #[serde(default)]
    properties: Option<PowerProperties>,
}

#[derive(Debug, Deserialize)]
struct PowerGeometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    #[serde(default)]
    parameter: BTreeMap<String, BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct PowerHeader {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "fillValue")]
    fill_value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ParameterMeta {
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    longname: Option<String>,
}

fn parse_json(body: &[u8]) -> Result<PowerData> {
    let format = OutputFormat::Json;
    let document: Value = serde_json::from_slice(body)
        .map_err(|e| PowerError::format(format, e.to_string()))?;
    let doc: PowerDocument = serde_json::from_value(document.clone())
        .map_err(|e| PowerError::format(format, e.to_string()))?;

    let (geometry, properties) = if let Some(feature) = doc.features.into_iter().next() {
        (feature.geometry, feature.properties)
    } else {
        (doc.geometry, doc.properties)
    };

    let parameter = properties
        .map(|p| p.parameter)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PowerError::format(format, "document holds no parameter series"))?;

    let fill_value = doc
        .header
        .as_ref()
        .and_then(|h| h.fill_value.as_ref())
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .unwrap_or(FILL_VALUE);

    // Union of the per-variable keys; fixed-width date keys sort
    // chronologically.
    let keys: BTreeSet<&String> = parameter.values().flat_map(|series| series.keys()).collect();
    if keys.is_empty() {
        return Err(PowerError::format(format, "parameter series are empty"));
    }

    let mut columns = vec!["DATE".to_string()];
    columns.extend(parameter.keys().cloned());

    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        let mut row = Vec::with_capacity(columns.len());
        row.push(Datum::Text(key.clone()));
        for series in parameter.values() {
            let value = series
                .get(key)
                .and_then(Value::as_f64)
                .unwrap_or(FILL_VALUE);
            // Normalize whatever sentinel the header declares.
            row.push(Datum::Float(if value == fill_value {
                FILL_VALUE
            } else {
                value
            }));
        }
        rows.push(row);
    }

    let mut metadata = MetadataHeader {
        fill_value: Some(fill_value),
        ..Default::default()
    };
    if let Some(header) = &doc.header {
        metadata.title = header.title.clone();
    }
    if let Some(geometry) = &geometry {
        metadata.longitude = geometry.coordinates.first().copied();
        metadata.latitude = geometry.coordinates.get(1).copied();
        metadata.elevation = geometry.coordinates.get(2).copied();
    }
    if let Some(meta) = &doc.parameters {
        for (code, info) in meta {
            let description = match (&info.longname, &info.units) {
                (Some(longname), Some(units)) => format!("{longname} ({units})"),
                (Some(longname), None) => longname.clone(),
                (None, Some(units)) => format!("({units})"),
                (None, None) => String::new(),
            };
            metadata.parameters.push((code.clone(), description));
        }
    }

    Ok(PowerData::Json {
        metadata: Some(metadata),
        table: MeteoTable { columns, rows },
        document,
    })
}

/// NetCDF payloads are not decoded; the magic is checked and the bytes
/// pass through for persisting.
fn parse_netcdf(body: &[u8]) -> Result<PowerData> {
    const HDF5_MAGIC: &[u8] = b"\x89HDF\r\n\x1a\n";
    if body.starts_with(b"CDF") || body.starts_with(HDF5_MAGIC) {
        Ok(PowerData::Netcdf {
            bytes: body.to_vec(),
        })
    } else {
        Err(PowerError::format(
            OutputFormat::Netcdf,
            "body carries neither the classic CDF nor the HDF5 magic",
        ))
    }
}

/// Writes decoded data to `target` and returns the written path.
///
/// Tables are re-encoded comma-separated (csv) or tab-separated (ascii);
/// JSON documents are pretty-printed; NetCDF bytes are written verbatim.
/// When a csv/ascii preamble was parsed, its verbatim text additionally
/// lands in a `<stem>_variables.txt` companion file.
pub fn persist(data: &PowerData, target: &Path, format: OutputFormat) -> Result<PathBuf> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PowerError::io(parent, e))?;
        }
    }

    match data {
        PowerData::Netcdf { bytes } => write_bytes(target, bytes)?,
        PowerData::Json { document, .. } => {
            let text = serde_json::to_string_pretty(document)
                .map_err(|e| PowerError::format(OutputFormat::Json, e.to_string()))?;
            write_bytes(target, text.as_bytes())?;
        }
        PowerData::Table { metadata, table } => {
            let delimiter = if format == OutputFormat::Ascii {
                b'\t'
            } else {
                b','
            };
            write_bytes(target, &encode_table(table, delimiter)?)?;

            if let Some(metadata) = metadata {
                if !metadata.raw.is_empty() {
                    let companion = companion_path(target);
                    write_bytes(&companion, metadata.raw.as_bytes())?;
                    debug!("wrote header preamble to {}", companion.display());
                }
            }
        }
    }

    Ok(target.to_path_buf())
}

fn encode_table(table: &MeteoTable, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer
        .write_record(&table.columns)
        .map_err(|e| PowerError::format(OutputFormat::Csv, e.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|d| d.to_string()))
            .map_err(|e| PowerError::format(OutputFormat::Csv, e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| PowerError::format(OutputFormat::Csv, e.to_string()))
}

fn companion_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "power_data".to_string());
    target.with_file_name(format!("{stem}_variables.txt"))
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(|e| PowerError::io(path, e))?;
    file.write_all(bytes).map_err(|e| PowerError::io(path, e))?;
    file.flush().map_err(|e| PowerError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV_FIXTURE: &str = "\
-BEGIN HEADER-
NASA/POWER CERES/MERRA2 Native Resolution Daily Data
Dates (month/day/year): 01/01/2022 through 01/03/2022
Location: Latitude  37.9838   Longitude  23.7275
Elevation from MERRA-2: Average for 0.5 x 0.625 degree lat/lon region = 178.98 meters
The value for missing source data that cannot be computed or is outside of the sources availability range: -999
Parameter(s):
T2M             MERRA-2 Temperature at 2 Meters (C)
WS2M            MERRA-2 Wind Speed at 2 Meters (m/s)
-END HEADER-
YEAR,MO,DY,T2M,WS2M
2022,1,1,10.51,2.5
2022,1,2,11.02,3.1
2022,1,3,-999,1.9
";

    const ASCII_FIXTURE: &str = "\
-BEGIN HEADER-
NASA/POWER CERES/MERRA2 Native Resolution Daily Data
Location: Latitude  37.9838   Longitude  23.7275
Elevation from MERRA-2: Average for 0.5 x 0.625 degree lat/lon region = 178.98 meters
The value for missing source data that cannot be computed or is outside of the sources availability range: -999
Parameter(s):
T2M             MERRA-2 Temperature at 2 Meters (C)
-END HEADER-
YEAR MO DY T2M
2022  1  1 10.51
2022  1  2 11.02
";

    #[test]
    fn csv_fixture_parses_preamble_and_rows() {
        let data = parse(CSV_FIXTURE.as_bytes(), OutputFormat::Csv).unwrap();
        let table = data.table().unwrap();
        assert_eq!(table.columns, ["YEAR", "MO", "DY", "T2M", "WS2M"]);
        assert_eq!(table.len(), 3);

        let metadata = data.metadata().unwrap();
        assert_eq!(metadata.latitude, Some(37.9838));
        assert_eq!(metadata.longitude, Some(23.7275));
        assert_eq!(metadata.elevation, Some(178.98));
        assert_eq!(metadata.fill_value, Some(FILL_VALUE));
        assert_eq!(metadata.parameters.len(), 2);
        assert_eq!(metadata.parameters[0].0, "T2M");
    }

    #[test]
    fn csv_row_count_matches_date_range() {
        let data = parse(CSV_FIXTURE.as_bytes(), OutputFormat::Csv).unwrap();
        let table = data.table().unwrap();
        let dates = table.dates().unwrap();

        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        assert_eq!(table.len() as i64, (end - start).num_days() + 1);
        assert_eq!(dates[0], start);
        assert_eq!(dates[2], end);
    }

    #[test]
    fn missing_cells_keep_the_sentinel() {
        let data = parse(CSV_FIXTURE.as_bytes(), OutputFormat::Csv).unwrap();
        let t2m = data.table().unwrap().column_f64("T2M").unwrap();
        assert_eq!(t2m, vec![10.51, 11.02, FILL_VALUE]);
    }

    #[test]
    fn ascii_fixture_parses_fixed_width_rows() {
        let data = parse(ASCII_FIXTURE.as_bytes(), OutputFormat::Ascii).unwrap();
        let table = data.table().unwrap();
        assert_eq!(table.columns, ["YEAR", "MO", "DY", "T2M"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][3], Datum::Float(10.51));
        assert_eq!(data.metadata().unwrap().elevation, Some(178.98));
    }

    #[test]
    fn ascii_column_mismatch_is_a_format_error() {
        let body = "YEAR MO DY T2M\n2022 1 1\n";
        assert!(matches!(
            parse(body.as_bytes(), OutputFormat::Ascii),
            Err(PowerError::Format { .. })
        ));
    }

    #[test]
    fn body_without_preamble_still_parses() {
        let body = "YEAR,MO,DY,T2M\n2022,1,1,10.5\n";
        let data = parse(body.as_bytes(), OutputFormat::Csv).unwrap();
        assert!(data.metadata().is_none());
        assert_eq!(data.table().unwrap().len(), 1);
    }

    #[test]
    fn empty_body_is_a_format_error() {
        assert!(matches!(
            parse(b"", OutputFormat::Csv),
            Err(PowerError::Format { .. })
        ));
    }

    fn json_fixture() -> String {
        serde_json::json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [23.7275, 37.9838, 178.98]},
            "properties": {
                "parameter": {
                    "T2M": {"20220101": 10.51, "20220102": 11.02},
                    "WS2M": {"20220101": 2.5, "20220102": -999.0}
                }
            },
            "header": {"title": "NASA/POWER Daily Data", "fill_value": -999.0},
            "parameters": {
                "T2M": {"units": "C", "longname": "Temperature at 2 Meters"},
                "WS2M": {"units": "m/s", "longname": "Wind Speed at 2 Meters"}
            }
        })
        .to_string()
    }

    #[test]
    fn json_document_flattens_to_a_date_keyed_table() {
        let data = parse(json_fixture().as_bytes(), OutputFormat::Json).unwrap();
        let table = data.table().unwrap();
        assert_eq!(table.columns, ["DATE", "T2M", "WS2M"]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.dates().unwrap(),
            vec![
                NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2022, 1, 2).unwrap(),
            ]
        );
        assert_eq!(table.column_f64("WS2M").unwrap(), vec![2.5, FILL_VALUE]);

        let metadata = data.metadata().unwrap();
        assert_eq!(metadata.elevation, Some(178.98));
        assert_eq!(metadata.latitude, Some(37.9838));
        assert_eq!(metadata.parameters[0].1, "Temperature at 2 Meters (C)");
    }

    #[test]
    fn legacy_features_shape_is_supported() {
        let body = serde_json::json!({
            "features": [{
                "geometry": {"coordinates": [5.1, 52.4, 3.0]},
                "properties": {"parameter": {"T2M": {"20220101": 4.2}}}
            }],
            "header": {"title": "legacy", "fillValue": "-999"}
        })
        .to_string();

        let data = parse(body.as_bytes(), OutputFormat::Json).unwrap();
        assert_eq!(data.metadata().unwrap().elevation, Some(3.0));
        assert_eq!(data.table().unwrap().column_f64("T2M").unwrap(), vec![4.2]);
    }

    #[test]
    fn json_without_series_is_a_format_error() {
        let body = r#"{"type": "Feature", "properties": {"parameter": {}}}"#;
        assert!(matches!(
            parse(body.as_bytes(), OutputFormat::Json),
            Err(PowerError::Format { .. })
        ));
    }

    #[test]
    fn hourly_json_keys_expose_hours() {
        let body = serde_json::json!({
            "properties": {
                "parameter": {"T2M": {"2022010100": 9.1, "2022010101": 9.3}}
            }
        })
        .to_string();
        let data = parse(body.as_bytes(), OutputFormat::Json).unwrap();
        assert_eq!(data.table().unwrap().hours(), Some(vec![0, 1]));
    }

    #[test]
    fn netcdf_magic_is_validated() {
        assert!(parse(b"CDF\x01rest-of-file", OutputFormat::Netcdf).is_ok());
        assert!(parse(b"\x89HDF\r\n\x1a\nrest", OutputFormat::Netcdf).is_ok());
        assert!(matches!(
            parse(b"not-a-netcdf", OutputFormat::Netcdf),
            Err(PowerError::Format { .. })
        ));
    }

    #[test]
    fn persist_writes_table_and_companion_header() {
        let dir = tempfile::tempdir().unwrap();
        let data = parse(CSV_FIXTURE.as_bytes(), OutputFormat::Csv).unwrap();

        let target = dir.path().join("athens.csv");
        let written = persist(&data, &target, OutputFormat::Csv).unwrap();
        assert_eq!(written, target);

        let text = std::fs::read_to_string(&target).unwrap();
        assert!(text.starts_with("YEAR,MO,DY,T2M,WS2M\n"));
        assert!(text.contains("2022,1,1,10.51,2.5\n"));

        let companion = std::fs::read_to_string(dir.path().join("athens_variables.txt")).unwrap();
        assert!(companion.contains("Parameter(s):"));
    }

    #[test]
    fn persist_tab_separates_ascii_tables() {
        let dir = tempfile::tempdir().unwrap();
        let data = parse(ASCII_FIXTURE.as_bytes(), OutputFormat::Ascii).unwrap();

        let target = dir.path().join("athens.txt");
        persist(&data, &target, OutputFormat::Ascii).unwrap();
        let text = std::fs::read_to_string(&target).unwrap();
        assert!(text.starts_with("YEAR\tMO\tDY\tT2M\n"));
    }

    #[test]
    fn persist_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let data = parse(b"CDF\x01payload", OutputFormat::Netcdf).unwrap();

        let target = dir.path().join("nested/deep/region.nc");
        persist(&data, &target, OutputFormat::Netcdf).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"CDF\x01payload");
    }
}
