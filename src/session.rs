//! Explicit session state and event dispatch.
//!
//! One [`Session`] per independent dashboard: it owns the active data source,
//! the query cache, the pager, and the filter/sort state, so there are no
//! process-wide globals and sessions can be tested without a UI harness.
//! Every discrete user action is a [`SessionEvent`] handled by
//! [`Session::apply`]; a failed transition leaves the prior state intact.

use crate::cache::{CacheStats, QueryCache};
use crate::config::ExplorerConfig;
use crate::error::{Error, Result};
use crate::export::{write_page_csv, CsvExportOptions};
use crate::filter::{FilterPredicate, FilterSpec, SortKey};
use crate::pager::Pager;
use crate::query::{build_query, count_rows, filter_expr, PageResult, QueryKey};
use crate::source::{CsvOptions, DataSource, UploadFormat};
use polars::prelude::*;
use std::io::Write;
use std::sync::Arc;

/// A discrete user action. Each variant maps to one state transition.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Load the bundled demo dataset; `rows` overrides the configured target.
    LoadDemo { rows: Option<usize> },
    /// Replace the active source with uploaded bytes. The prior source stays
    /// active when parsing fails.
    Upload {
        bytes: Vec<u8>,
        format: UploadFormat,
    },
    SetFilter {
        column: String,
        predicate: FilterPredicate,
    },
    ClearFilter { column: String },
    ClearFilters,
    SetSort { keys: Vec<SortKey> },
    SetPageSize { size: usize },
    NextPage,
    PrevPage,
    JumpToPage { page: usize },
}

/// What the table render sink receives for one page.
#[derive(Clone)]
pub struct PageView {
    pub result: Arc<PageResult>,
    pub total_rows: usize,
    pub page: usize,
    pub page_size: usize,
}

impl PageView {
    pub fn last_page(&self) -> usize {
        if self.total_rows == 0 {
            0
        } else {
            (self.total_rows - 1) / self.page_size
        }
    }
}

/// Aggregates for the dashboard's metric row, computed over the full filtered
/// set (not the visible page).
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    /// Rows matching the current filters.
    pub rows: usize,
    /// Distinct values in the group column.
    pub distinct: usize,
    /// Median of the value column; None when no rows match.
    pub median: Option<f64>,
    /// Sum of the value column.
    pub sum: Option<f64>,
}

/// Explorer session: the single-writer context for one dashboard.
pub struct Session {
    config: ExplorerConfig,
    source: Option<DataSource>,
    cache: QueryCache,
    pager: Pager,
    filters: FilterSpec,
    sort: Vec<SortKey>,
}

impl Session {
    pub fn new(config: ExplorerConfig) -> Self {
        let cache = QueryCache::new(config.cache_capacity);
        let pager = Pager::new(config.page_size);
        Self {
            config,
            source: None,
            cache,
            pager,
            filters: FilterSpec::new(),
            sort: Vec::new(),
        }
    }

    /// Session with a source already installed (e.g. from a file path).
    pub fn with_source(config: ExplorerConfig, source: DataSource) -> Result<Self> {
        let mut session = Self::new(config);
        session.replace_source(source)?;
        Ok(session)
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&DataSource> {
        self.source.as_ref()
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Handle one user action. Errors are recoverable: the session state is
    /// the same as before the event.
    pub fn apply(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::LoadDemo { rows } => {
                let target = rows.unwrap_or(self.config.demo_rows);
                let source = DataSource::generated(target)?;
                self.replace_source(source)
            }
            SessionEvent::Upload { bytes, format } => {
                let csv = CsvOptions {
                    delimiter: self.config.delimiter_byte(),
                    has_header: self.config.csv.has_header,
                };
                // Parse first; the prior source survives a failed upload.
                let source = DataSource::load_uploaded_with(&bytes, format, &csv)?;
                self.replace_source(source)
            }
            SessionEvent::SetFilter { column, predicate } => {
                let source = self.source.as_ref().ok_or(Error::NoData)?;
                let mut candidate = self.filters.clone();
                candidate.insert(column, predicate);
                // A fresh count query; also validates the candidate spec
                // before any state changes.
                let total = count_rows(source, &candidate)?;
                self.filters = candidate;
                self.pager.set_total_rows(total);
                Ok(())
            }
            SessionEvent::ClearFilter { column } => {
                let source = self.source.as_ref().ok_or(Error::NoData)?;
                let mut candidate = self.filters.clone();
                if candidate.remove(&column).is_none() {
                    return Ok(());
                }
                let total = count_rows(source, &candidate)?;
                self.filters = candidate;
                self.pager.set_total_rows(total);
                Ok(())
            }
            SessionEvent::ClearFilters => {
                let source = self.source.as_ref().ok_or(Error::NoData)?;
                if self.filters.is_empty() {
                    return Ok(());
                }
                let total = count_rows(source, &FilterSpec::new())?;
                self.filters.clear();
                self.pager.set_total_rows(total);
                Ok(())
            }
            SessionEvent::SetSort { keys } => {
                let source = self.source.as_ref().ok_or(Error::NoData)?;
                for key in &keys {
                    if !source.has_column(&key.column) {
                        return Err(Error::InvalidFilter {
                            column: key.column.clone(),
                            reason: "unknown sort column".to_string(),
                        });
                    }
                }
                self.sort = keys;
                Ok(())
            }
            SessionEvent::SetPageSize { size } => {
                if size == 0 {
                    return Err(Error::InvalidPage(
                        "page size must be positive".to_string(),
                    ));
                }
                self.pager.set_page_size(size);
                Ok(())
            }
            SessionEvent::NextPage => {
                self.pager.next();
                Ok(())
            }
            SessionEvent::PrevPage => {
                self.pager.prev();
                Ok(())
            }
            SessionEvent::JumpToPage { page } => {
                self.pager.jump(page);
                Ok(())
            }
        }
    }

    /// The current page, served from the cache when possible. A query failure
    /// leaves the cache unpopulated and the session state untouched.
    pub fn current_page(&mut self) -> Result<Arc<PageResult>> {
        let source = self.source.as_ref().ok_or(Error::NoData)?;
        let key = QueryKey {
            source: source.id(),
            filters: self.filters.clone(),
            sort: self.sort.clone(),
            page: self.pager.request(),
        };
        let query = build_query(source, &self.filters, &self.sort, key.page)?;
        let result = self.cache.get_or_compute(&key, move || query.collect())?;
        // Keep the pager's total in sync with what the executed query saw.
        self.pager.set_total_rows(result.total_rows);
        Ok(result)
    }

    /// Bundle for the table render sink.
    pub fn page_view(&mut self) -> Result<PageView> {
        let result = self.current_page()?;
        Ok(PageView {
            total_rows: result.total_rows,
            page: self.pager.page(),
            page_size: self.pager.page_size(),
            result,
        })
    }

    /// Full filtered set (unpaginated, unsorted) for the chart sink, which
    /// owns its own sampling and rendering strategy.
    pub fn chart_frame(&self) -> Result<LazyFrame> {
        let source = self.source.as_ref().ok_or(Error::NoData)?;
        let mut lf = source.lazy();
        if let Some(expr) = filter_expr(&self.filters, source.schema())? {
            lf = lf.filter(expr);
        }
        Ok(lf)
    }

    /// Metric-row aggregates over the filtered set: distinct count of
    /// `group_column`, median and sum of `value_column`.
    pub fn kpis(&self, group_column: &str, value_column: &str) -> Result<Kpis> {
        let source = self.source.as_ref().ok_or(Error::NoData)?;
        for column in [group_column, value_column] {
            if !source.has_column(column) {
                return Err(Error::InvalidFilter {
                    column: column.to_string(),
                    reason: "unknown column".to_string(),
                });
            }
        }
        let mut lf = source.lazy();
        if let Some(expr) = filter_expr(&self.filters, source.schema())? {
            lf = lf.filter(expr);
        }
        let df = lf
            .select([
                len().alias("rows"),
                col(group_column).n_unique().alias("distinct"),
                col(value_column)
                    .median()
                    .cast(DataType::Float64)
                    .alias("median"),
                col(value_column)
                    .sum()
                    .cast(DataType::Float64)
                    .alias("sum"),
            ])
            .collect()?;
        let row = df.get(0).ok_or(Error::NoData)?;
        Ok(Kpis {
            rows: count_value(row.first()),
            distinct: count_value(row.get(1)),
            median: float_value(row.get(2)),
            sum: float_value(row.get(3)),
        })
    }

    /// Download surface: write the current visible page as CSV.
    pub fn export_page_csv<W: Write>(&mut self, writer: W) -> Result<()> {
        let page = self.current_page()?;
        let options = CsvExportOptions {
            separator: self.config.delimiter_byte(),
            include_header: true,
        };
        write_page_csv(&page, writer, &options)
    }

    /// Install a new source: caches drop, filter/sort state resets, and the
    /// pager returns to page 0 with the new total.
    fn replace_source(&mut self, source: DataSource) -> Result<()> {
        let total = match source.row_count() {
            Some(n) => n,
            None => count_rows(&source, &FilterSpec::new())?,
        };
        self.filters.clear();
        self.sort.clear();
        self.cache.invalidate_all();
        self.source = Some(source);
        self.pager = Pager::new(self.pager.page_size());
        self.pager.set_total_rows(total);
        Ok(())
    }
}

fn count_value(value: Option<&AnyValue>) -> usize {
    match value {
        Some(AnyValue::UInt32(n)) => *n as usize,
        Some(AnyValue::UInt64(n)) => *n as usize,
        _ => 0,
    }
}

fn float_value(value: Option<&AnyValue>) -> Option<f64> {
    match value {
        Some(AnyValue::Float64(f)) => Some(*f),
        Some(AnyValue::Float32(f)) => Some(*f as f64),
        _ => None,
    }
}
