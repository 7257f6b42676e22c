//! datadeck: the query, pagination, and caching core of a tabular data
//! dashboard.
//!
//! A [`Session`] owns one active [`DataSource`] (the bundled demo table or
//! uploaded CSV/Parquet bytes), translates filter/sort/page state into
//! bounded Polars queries, memoizes executed pages in a bounded LRU cache,
//! and hands [`PageView`]s to a render sink. The sink never feeds back; all
//! state changes go through [`SessionEvent`]s.
//!
//! ```no_run
//! use datadeck::{ExplorerConfig, FilterPredicate, Session, SessionEvent};
//!
//! let mut session = Session::new(ExplorerConfig::default());
//! session.apply(SessionEvent::LoadDemo { rows: None })?;
//! session.apply(SessionEvent::SetFilter {
//!     column: "year".to_string(),
//!     predicate: FilterPredicate::Equals("2007".to_string()),
//! })?;
//! session.apply(SessionEvent::NextPage)?;
//! let view = session.page_view()?;
//! println!("{} of {} rows", view.result.len(), view.total_rows);
//! # Ok::<(), datadeck::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod pager;
pub mod query;
pub mod session;
pub mod source;

pub use cache::{CacheStats, QueryCache};
pub use config::{ConfigManager, CsvConfig, ExplorerConfig};
pub use error::{Error, Result};
pub use export::{page_csv_string, write_page_csv, CsvExportOptions};
pub use filter::{FilterPredicate, FilterSpec, SortDirection, SortKey};
pub use pager::Pager;
pub use query::{build_query, count_rows, BoundedQuery, PageRequest, PageResult, QueryKey};
pub use session::{Kpis, PageView, Session, SessionEvent};
pub use source::{CsvOptions, DataSource, SourceId, SourceOrigin, UploadFormat};
