//! Query construction: translate filter/sort/page state into a pair of
//! bounded Polars queries (the page slice and the filtered row count).

use crate::error::{Error, Result};
use crate::filter::{FilterPredicate, FilterSpec, SortKey};
use crate::source::{DataSource, SourceId};
use polars::prelude::*;

/// A page request. Page indices are 0-based; a zero page size is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }

    pub fn offset(&self) -> usize {
        self.page * self.page_size
    }
}

/// Cache identity of a bounded query. Two keys are equal iff source identity,
/// filters, sort order, and page request are all equal under value semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub source: SourceId,
    pub filters: FilterSpec,
    pub sort: Vec<SortKey>,
    pub page: PageRequest,
}

/// One page of rows plus the total count of filtered rows (independent of
/// pagination). Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub rows: DataFrame,
    pub total_rows: usize,
}

impl PageResult {
    pub fn len(&self) -> usize {
        self.rows.height()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.height() == 0
    }
}

/// A built, not yet executed query: the page slice and the filtered count.
/// Construction is pure; execution happens in [`BoundedQuery::collect`].
pub struct BoundedQuery {
    page: LazyFrame,
    count: LazyFrame,
}

impl std::fmt::Debug for BoundedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQuery").finish_non_exhaustive()
    }
}

impl BoundedQuery {
    /// Execute both halves. The count runs first so an engine failure leaves
    /// nothing half-built.
    pub fn collect(self) -> Result<PageResult> {
        let total_rows = collect_count(self.count)?;
        let rows = self.page.collect()?;
        Ok(PageResult { rows, total_rows })
    }
}

/// Translate `(source, filters, sort, page)` into a [`BoundedQuery`].
///
/// Filter and sort columns must exist in the source schema
/// ([`Error::InvalidFilter`]); the page size must be positive
/// ([`Error::InvalidPage`]). The page half requests exactly
/// `page.page_size` rows at offset `page.page * page.page_size`.
pub fn build_query(
    source: &DataSource,
    filters: &FilterSpec,
    sort: &[SortKey],
    page: PageRequest,
) -> Result<BoundedQuery> {
    if page.page_size == 0 {
        return Err(Error::InvalidPage("page size must be positive".to_string()));
    }
    for column in filters.keys() {
        if !source.has_column(column) {
            return Err(Error::InvalidFilter {
                column: column.clone(),
                reason: "unknown column".to_string(),
            });
        }
    }
    for key in sort {
        if !source.has_column(&key.column) {
            return Err(Error::InvalidFilter {
                column: key.column.clone(),
                reason: "unknown sort column".to_string(),
            });
        }
    }

    let mut lf = source.lazy();
    if let Some(expr) = filter_expr(filters, source.schema())? {
        lf = lf.filter(expr);
    }
    if !sort.is_empty() {
        let options = SortMultipleOptions {
            descending: sort.iter().map(|k| k.direction.is_descending()).collect(),
            ..Default::default()
        };
        lf = lf.sort_by_exprs(
            sort.iter().map(|k| col(&k.column)).collect::<Vec<_>>(),
            options,
        );
    }

    let count = lf.clone().select([len()]);
    let page_lf = lf.slice(page.offset() as i64, page.page_size as IdxSize);
    Ok(BoundedQuery {
        page: page_lf,
        count,
    })
}

/// Count of rows matching `filters`, independent of pagination and sort.
pub fn count_rows(source: &DataSource, filters: &FilterSpec) -> Result<usize> {
    for column in filters.keys() {
        if !source.has_column(column) {
            return Err(Error::InvalidFilter {
                column: column.clone(),
                reason: "unknown column".to_string(),
            });
        }
    }
    let mut lf = source.lazy();
    if let Some(expr) = filter_expr(filters, source.schema())? {
        lf = lf.filter(expr);
    }
    collect_count(lf.select([len()]))
}

/// Fold the filter map into one AND-combined expression, or None when empty.
pub(crate) fn filter_expr(filters: &FilterSpec, schema: &Schema) -> Result<Option<Expr>> {
    let mut combined: Option<Expr> = None;
    for (column, predicate) in filters {
        let expr = predicate_expr(column, predicate, schema.get(column))?;
        combined = Some(match combined {
            Some(current) => current.and(expr),
            None => expr,
        });
    }
    Ok(combined)
}

fn predicate_expr(
    column: &str,
    predicate: &FilterPredicate,
    dtype: Option<&DataType>,
) -> Result<Expr> {
    let col_expr = col(column);
    match predicate {
        FilterPredicate::Between { min, max } => {
            if min > max {
                return Err(Error::InvalidFilter {
                    column: column.to_string(),
                    reason: format!("empty range: min {} exceeds max {}", min, max),
                });
            }
            Ok(col_expr
                .clone()
                .gt_eq(lit(*min))
                .and(col_expr.lt_eq(lit(*max))))
        }
        FilterPredicate::Equals(value) => Ok(col_expr.eq(typed_lit(value, dtype))),
        FilterPredicate::OneOf(values) => {
            // An empty multiselect matches nothing.
            let mut membership: Option<Expr> = None;
            for value in values {
                let eq = col_expr.clone().eq(typed_lit(value, dtype));
                membership = Some(match membership {
                    Some(current) => current.or(eq),
                    None => eq,
                });
            }
            Ok(membership.unwrap_or_else(|| lit(false)))
        }
        FilterPredicate::Contains(needle) => {
            Ok(col_expr.str().contains_literal(lit(needle.clone())))
        }
    }
}

/// Coerce a string value to a literal matching the column dtype, falling back
/// to the string itself when it does not parse.
fn typed_lit(value: &str, dtype: Option<&DataType>) -> Expr {
    match dtype {
        Some(DataType::Float32 | DataType::Float64) => value
            .parse::<f64>()
            .map(lit)
            .unwrap_or_else(|_| lit(value)),
        Some(DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64) => value
            .parse::<i64>()
            .map(lit)
            .unwrap_or_else(|_| lit(value)),
        Some(DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64) => value
            .parse::<u64>()
            .map(lit)
            .unwrap_or_else(|_| lit(value)),
        Some(DataType::Boolean) => value
            .parse::<bool>()
            .map(lit)
            .unwrap_or_else(|_| lit(value)),
        _ => lit(value),
    }
}

/// Run a `select([len()])` query and extract the count.
pub(crate) fn collect_count(lf: LazyFrame) -> Result<usize> {
    let df = lf.collect()?;
    if let Some(row) = df.get(0) {
        if let Some(AnyValue::UInt32(n)) = row.first() {
            return Ok(*n as usize);
        }
    }
    Ok(0)
}
