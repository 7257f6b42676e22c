//! CSV download surface for the currently visible page.
//!
//! Exports the page only, not the full filtered set; the header row follows
//! the page's column order, which is the source schema order.

use crate::error::Result;
use crate::query::PageResult;
use polars::prelude::*;
use std::io::Write;

#[derive(Debug, Clone)]
pub struct CsvExportOptions {
    pub separator: u8,
    pub include_header: bool,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            include_header: true,
        }
    }
}

/// Write the visible page as CSV into `writer`.
pub fn write_page_csv<W: Write>(
    page: &PageResult,
    writer: W,
    options: &CsvExportOptions,
) -> Result<()> {
    // CsvWriter wants a mutable frame; the page itself stays immutable.
    let mut df = page.rows.clone();
    CsvWriter::new(writer)
        .with_separator(options.separator)
        .include_header(options.include_header)
        .finish(&mut df)?;
    Ok(())
}

/// Render the visible page as a CSV string for in-memory consumers.
pub fn page_csv_string(page: &PageResult, options: &CsvExportOptions) -> Result<String> {
    let mut buf = Vec::new();
    write_page_csv(page, &mut buf, options)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> PageResult {
        PageResult {
            rows: df!(
                "country" => ["China", "India"],
                "year" => [2007_i32, 2007],
                "pop" => [1_318_683_096_i64, 1_110_396_331],
            )
            .unwrap(),
            total_rows: 142,
        }
    }

    #[test]
    fn test_header_row_matches_column_order() {
        let csv = page_csv_string(&sample_page(), &CsvExportOptions::default()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("country,year,pop"));
        assert_eq!(lines.next(), Some("China,2007,1318683096"));
        assert_eq!(lines.next(), Some("India,2007,1110396331"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_custom_separator() {
        let options = CsvExportOptions {
            separator: b';',
            include_header: true,
        };
        let csv = page_csv_string(&sample_page(), &options).unwrap();
        assert!(csv.starts_with("country;year;pop"));
    }

    #[test]
    fn test_header_can_be_suppressed() {
        let options = CsvExportOptions {
            separator: b',',
            include_header: false,
        };
        let csv = page_csv_string(&sample_page(), &options).unwrap();
        assert!(csv.starts_with("China,"));
    }

    #[test]
    fn test_empty_page_exports_header_only() {
        let page = PageResult {
            rows: df!("a" => Vec::<i64>::new(), "b" => Vec::<String>::new()).unwrap(),
            total_rows: 0,
        };
        let csv = page_csv_string(&page, &CsvExportOptions::default()).unwrap();
        assert_eq!(csv.trim_end(), "a,b");
    }
}
