//! Data source adapter: wraps the bundled demo table or uploaded bytes
//! behind a uniform lazy handle with a schema snapshot taken at load time.

use crate::error::{Error, Result};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide id counter. A new upload or regeneration always yields a new
/// identity, which is what invalidates downstream caches.
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one loaded data source. Equal ids imply the same immutable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        SourceId(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Declared format of an upload. Anything else is rejected before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Parquet,
}

impl UploadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadFormat::Csv => "csv",
            UploadFormat::Parquet => "parquet",
        }
    }

    /// Resolve a user-declared format name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "csv" => Ok(UploadFormat::Csv),
            "parquet" | "pq" => Ok(UploadFormat::Parquet),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    /// Infer the format from a file extension, if recognizable.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "csv" => Some(UploadFormat::Csv),
            "parquet" | "pq" => Some(UploadFormat::Parquet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    Generated,
    UploadedCsv,
    UploadedParquet,
}

/// CSV read options for the upload surface, reduced to what it needs.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }
}

/// An immutable, loaded tabular data source. Replaced wholesale on upload;
/// cloning is cheap (the lazy handle is reference-counted).
#[derive(Clone)]
pub struct DataSource {
    id: SourceId,
    origin: SourceOrigin,
    lf: LazyFrame,
    schema: Arc<Schema>,
    row_count: Option<usize>,
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("schema", &self.schema)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl DataSource {
    fn new(lf: LazyFrame, origin: SourceOrigin, row_count: Option<usize>) -> Result<Self> {
        let mut lf = lf;
        let schema = lf.collect_schema()?;
        Ok(Self {
            id: SourceId::next(),
            origin,
            lf,
            schema,
            row_count,
        })
    }

    /// Bundled offline demo dataset: a development-panel-shaped table
    /// (country, continent, year, life expectancy, population, GDP per
    /// capita) extended deterministically to the requested row count.
    /// Closed-form per-row values only; no randomness.
    pub fn generated(row_count_target: usize) -> Result<Self> {
        let df = demo_frame(row_count_target)?;
        let rows = df.height();
        Self::new(df.lazy(), SourceOrigin::Generated, Some(rows))
    }

    /// Load uploaded bytes under the declared format with default CSV options.
    pub fn load_uploaded(bytes: &[u8], format: UploadFormat) -> Result<Self> {
        Self::load_uploaded_with(bytes, format, &CsvOptions::default())
    }

    /// Load uploaded bytes under the declared format. Fails with
    /// [`Error::ParseUpload`] when the bytes do not parse; the caller's prior
    /// source is untouched because construction is by-value.
    pub fn load_uploaded_with(
        bytes: &[u8],
        format: UploadFormat,
        csv: &CsvOptions,
    ) -> Result<Self> {
        match format {
            UploadFormat::Csv => Self::from_csv_bytes(bytes, csv),
            UploadFormat::Parquet => Self::from_parquet_bytes(bytes),
        }
    }

    fn from_csv_bytes(bytes: &[u8], csv: &CsvOptions) -> Result<Self> {
        let mut read_options = CsvReadOptions::default();
        read_options.has_header = csv.has_header;
        let delimiter = csv.delimiter;
        read_options = read_options.map_parse_options(|opts| opts.with_separator(delimiter));
        let df = CsvReader::new(Cursor::new(bytes.to_vec()))
            .with_options(read_options)
            .finish()
            .map_err(|e| Error::ParseUpload {
                format: "csv",
                source: e,
            })?;
        let rows = df.height();
        let lf = trim_column_names(df.lazy())?;
        Self::new(lf, SourceOrigin::UploadedCsv, Some(rows))
    }

    fn from_parquet_bytes(bytes: &[u8]) -> Result<Self> {
        let df = ParquetReader::new(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| Error::ParseUpload {
                format: "parquet",
                source: e,
            })?;
        let rows = df.height();
        Self::new(df.lazy(), SourceOrigin::UploadedParquet, Some(rows))
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn origin(&self) -> SourceOrigin {
        self.origin
    }

    /// Schema snapshot taken at load time.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.iter_names().map(|s| s.to_string()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.schema.get(name).is_some()
    }

    /// Fresh lazy handle over the full dataset.
    pub fn lazy(&self) -> LazyFrame {
        self.lf.clone()
    }

    /// Row count when known at load time (eager loads); None until a scan.
    pub fn row_count(&self) -> Option<usize> {
        self.row_count
    }
}

/// Leading/trailing whitespace in CSV headers is a recurring upload artifact;
/// trim so filters address the names users see.
fn trim_column_names(mut lf: LazyFrame) -> Result<LazyFrame> {
    let schema = lf.collect_schema()?;
    let names: Vec<String> = schema.iter_names().map(|s| s.to_string()).collect();
    let trimmed: Vec<String> = names.iter().map(|s| s.trim().to_string()).collect();
    if names == trimmed {
        return Ok(lf);
    }
    Ok(lf.rename(
        names.iter().map(|s| s.as_str()),
        trimmed.iter().map(|s| s.as_str()),
        false,
    ))
}

const DEMO_YEARS: [i32; 12] = [
    1952, 1957, 1962, 1967, 1972, 1977, 1982, 1987, 1992, 1997, 2002, 2007,
];

const DEMO_COUNTRIES: &[(&str, &str)] = &[
    ("Nigeria", "Africa"),
    ("Egypt", "Africa"),
    ("Kenya", "Africa"),
    ("South Africa", "Africa"),
    ("Ethiopia", "Africa"),
    ("China", "Asia"),
    ("India", "Asia"),
    ("Japan", "Asia"),
    ("Indonesia", "Asia"),
    ("Vietnam", "Asia"),
    ("Germany", "Europe"),
    ("France", "Europe"),
    ("Poland", "Europe"),
    ("Spain", "Europe"),
    ("Sweden", "Europe"),
    ("United States", "Americas"),
    ("Brazil", "Americas"),
    ("Mexico", "Americas"),
    ("Argentina", "Americas"),
    ("Canada", "Americas"),
    ("Australia", "Oceania"),
    ("New Zealand", "Oceania"),
];

/// Deterministic demo table of exactly `target_rows` rows. The (country, year)
/// grid cycles when the target exceeds one full pass; a cohort term keeps the
/// numeric columns varying across passes.
fn demo_frame(target_rows: usize) -> std::result::Result<DataFrame, PolarsError> {
    let years = DEMO_YEARS.len();
    let mut country = Vec::with_capacity(target_rows);
    let mut continent = Vec::with_capacity(target_rows);
    let mut year = Vec::with_capacity(target_rows);
    let mut life_exp = Vec::with_capacity(target_rows);
    let mut pop = Vec::with_capacity(target_rows);
    let mut gdp_per_cap = Vec::with_capacity(target_rows);

    for i in 0..target_rows {
        let country_idx = (i / years) % DEMO_COUNTRIES.len();
        let year_idx = i % years;
        let cohort = i / (years * DEMO_COUNTRIES.len());
        let (name, cont) = DEMO_COUNTRIES[country_idx];

        country.push(name);
        continent.push(cont);
        year.push(DEMO_YEARS[year_idx]);
        life_exp.push(42.0 + year_idx as f64 * 1.9 + ((country_idx * 7) % 23) as f64 * 1.1);
        pop.push(
            1_500_000_i64
                + (country_idx as i64 * 7_393_271) % 80_000_000
                + year_idx as i64 * 650_000
                + cohort as i64,
        );
        gdp_per_cap.push(
            (600 + ((country_idx * 37) % 97) * 180) as f64 * (1.0 + 0.04 * year_idx as f64)
                + cohort as f64,
        );
    }

    df!(
        "country" => country,
        "continent" => continent,
        "year" => year,
        "life_exp" => life_exp,
        "pop" => pop,
        "gdp_per_cap" => gdp_per_cap,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_hits_row_target() {
        let source = DataSource::generated(100).unwrap();
        assert_eq!(source.row_count(), Some(100));
        assert_eq!(source.origin(), SourceOrigin::Generated);
        let df = source.lazy().collect().unwrap();
        assert_eq!(df.height(), 100);
        assert_eq!(
            source.column_names(),
            vec!["country", "continent", "year", "life_exp", "pop", "gdp_per_cap"]
        );
    }

    #[test]
    fn test_generated_is_deterministic() {
        let a = DataSource::generated(50).unwrap().lazy().collect().unwrap();
        let b = DataSource::generated(50).unwrap().lazy().collect().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_generated_zero_rows() {
        let source = DataSource::generated(0).unwrap();
        let df = source.lazy().collect().unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 6);
    }

    #[test]
    fn test_source_ids_are_unique() {
        let a = DataSource::generated(1).unwrap();
        let b = DataSource::generated(1).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_csv_upload() {
        let bytes = b"name,score\nalice,10\nbob,20\n";
        let source = DataSource::load_uploaded(bytes, UploadFormat::Csv).unwrap();
        assert_eq!(source.origin(), SourceOrigin::UploadedCsv);
        assert_eq!(source.row_count(), Some(2));
        assert!(source.has_column("score"));
    }

    #[test]
    fn test_csv_upload_trims_header_whitespace() {
        let bytes = b" name , score \nalice,10\n";
        let source = DataSource::load_uploaded(bytes, UploadFormat::Csv).unwrap();
        assert_eq!(source.column_names(), vec!["name", "score"]);
    }

    #[test]
    fn test_csv_upload_custom_delimiter() {
        let bytes = b"a|b\n1|2\n";
        let csv = CsvOptions {
            delimiter: b'|',
            has_header: true,
        };
        let source = DataSource::load_uploaded_with(bytes, UploadFormat::Csv, &csv).unwrap();
        assert_eq!(source.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_malformed_parquet_is_parse_error() {
        let err =
            DataSource::load_uploaded(b"not parquet at all", UploadFormat::Parquet).unwrap_err();
        assert!(matches!(
            err,
            Error::ParseUpload {
                format: "parquet",
                ..
            }
        ));
    }

    #[test]
    fn test_parquet_upload_roundtrip() {
        let mut df = df!("x" => [1_i64, 2, 3], "y" => ["a", "b", "c"]).unwrap();
        let mut buf = Vec::new();
        ParquetWriter::new(&mut buf).finish(&mut df).unwrap();

        let source = DataSource::load_uploaded(&buf, UploadFormat::Parquet).unwrap();
        assert_eq!(source.origin(), SourceOrigin::UploadedParquet);
        assert_eq!(source.row_count(), Some(3));
        assert_eq!(source.lazy().collect().unwrap(), df);
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(UploadFormat::from_name("CSV").unwrap(), UploadFormat::Csv);
        assert_eq!(
            UploadFormat::from_name("parquet").unwrap(),
            UploadFormat::Parquet
        );
        let err = UploadFormat::from_name("xlsx").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(name) if name == "xlsx"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            UploadFormat::from_path(Path::new("data/sales.parquet")),
            Some(UploadFormat::Parquet)
        );
        assert_eq!(
            UploadFormat::from_path(Path::new("sales.CSV")),
            Some(UploadFormat::Csv)
        );
        assert_eq!(UploadFormat::from_path(Path::new("sales.orc")), None);
    }
}
