use datadeck::{
    CsvExportOptions, Error, ExplorerConfig, FilterPredicate, Session, SessionEvent, SortKey,
    UploadFormat,
};
use std::sync::Arc;

mod common;

fn session_with_sample() -> Session {
    let mut session = Session::new(ExplorerConfig::default());
    session
        .apply(SessionEvent::Upload {
            bytes: common::sample_csv_bytes(),
            format: UploadFormat::Csv,
        })
        .unwrap();
    session
}

#[test]
fn test_ten_rows_page_size_three_gives_four_pages() {
    let mut session = session_with_sample();
    session.apply(SessionEvent::SetPageSize { size: 3 }).unwrap();
    assert_eq!(session.pager().last_page(), 3);

    let mut sizes = Vec::new();
    loop {
        let view = session.page_view().unwrap();
        sizes.push(view.result.len());
        if session.pager().page() == session.pager().last_page() {
            break;
        }
        session.apply(SessionEvent::NextPage).unwrap();
    }
    assert_eq!(sizes, vec![3, 3, 3, 1]);

    // Landed on the last page; further next() calls are no-ops.
    session.apply(SessionEvent::NextPage).unwrap();
    assert_eq!(session.pager().page(), 3);
}

#[test]
fn test_filter_sort_paginate_workflow() {
    let mut session = session_with_sample();
    session.apply(SessionEvent::SetPageSize { size: 4 }).unwrap();
    session
        .apply(SessionEvent::SetFilter {
            column: "region".to_string(),
            predicate: FilterPredicate::Equals("west".to_string()),
        })
        .unwrap();
    assert_eq!(session.pager().total_rows(), 6);
    session
        .apply(SessionEvent::SetSort {
            keys: vec![SortKey::descending("score")],
        })
        .unwrap();

    let first = session.page_view().unwrap();
    assert_eq!(first.result.len(), 4);
    let top_scores: Vec<i64> = first
        .result
        .rows
        .column("score")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(top_scores, vec![90, 88, 77, 70]);

    session.apply(SessionEvent::NextPage).unwrap();
    let second = session.page_view().unwrap();
    assert_eq!(second.result.len(), 2);
    assert_eq!(second.last_page(), 1);
}

#[test]
fn test_range_and_membership_filters_combine() {
    let mut session = session_with_sample();
    session
        .apply(SessionEvent::SetFilter {
            column: "score".to_string(),
            predicate: FilterPredicate::Between {
                min: 70.0,
                max: 90.0,
            },
        })
        .unwrap();
    session
        .apply(SessionEvent::SetFilter {
            column: "region".to_string(),
            predicate: FilterPredicate::OneOf(vec!["south".to_string(), "north".to_string()]),
        })
        .unwrap();
    // Atlanta 81, Boston 75, Houston 85.
    assert_eq!(session.pager().total_rows(), 3);

    session
        .apply(SessionEvent::ClearFilter {
            column: "region".to_string(),
        })
        .unwrap();
    assert_eq!(session.pager().total_rows(), 7);
}

#[test]
fn test_cached_page_survives_repeat_queries() {
    let mut session = session_with_sample();
    let first = session.current_page().unwrap();
    let second = session.current_page().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // A different page is a different key.
    session.apply(SessionEvent::SetPageSize { size: 3 }).unwrap();
    session.apply(SessionEvent::NextPage).unwrap();
    let third = session.current_page().unwrap();
    assert!(!Arc::ptr_eq(&second, &third));
}

#[test]
fn test_malformed_csv_upload_keeps_prior_source_queryable() {
    let mut session = session_with_sample();
    let prior_total = session.pager().total_rows();

    // Ragged row: more fields than the header declares.
    let err = session
        .apply(SessionEvent::Upload {
            bytes: b"a,b\n1,2,3,4,5\n".to_vec(),
            format: UploadFormat::Csv,
        })
        .unwrap_err();
    assert!(matches!(err, Error::ParseUpload { format: "csv", .. }));

    assert_eq!(session.pager().total_rows(), prior_total);
    let page = session.current_page().unwrap();
    assert_eq!(page.total_rows, 10);
    assert!(page
        .rows
        .column("city")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .flatten()
        .any(|c| c == "Atlanta"));
}

#[test]
fn test_unknown_filter_column_leaves_cache_untouched() {
    let mut session = session_with_sample();
    session.current_page().unwrap();
    let misses_before = session.cache_stats().misses;

    let err = session
        .apply(SessionEvent::SetFilter {
            column: "elevation".to_string(),
            predicate: FilterPredicate::Equals("1".to_string()),
        })
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFilter { column, .. } if column == "elevation"));

    // No query executed, no new cache traffic besides the hit below.
    assert_eq!(session.cache_stats().misses, misses_before);
    session.current_page().unwrap();
    assert_eq!(session.cache_stats().misses, misses_before);
}

#[test]
fn test_parquet_upload_matches_csv_upload() {
    let mut csv_session = session_with_sample();
    let mut parquet_session = Session::new(ExplorerConfig::default());
    parquet_session
        .apply(SessionEvent::Upload {
            bytes: common::sample_parquet_bytes(),
            format: UploadFormat::Parquet,
        })
        .unwrap();

    let a = csv_session.current_page().unwrap();
    let b = parquet_session.current_page().unwrap();
    assert_eq!(a.total_rows, b.total_rows);
    assert_eq!(a.rows, b.rows);
}

#[test]
fn test_export_visible_page_only() {
    let mut session = session_with_sample();
    session.apply(SessionEvent::SetPageSize { size: 3 }).unwrap();
    session.apply(SessionEvent::NextPage).unwrap();

    let mut buf = Vec::new();
    session.export_page_csv(&mut buf).unwrap();
    let csv = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    // Header plus the three rows of page 1, not the full filtered set.
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "city,region,score");
    assert_eq!(lines[1], "Denver,west,90");
}

#[test]
fn test_export_to_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.csv");

    let mut session = session_with_sample();
    let file = std::fs::File::create(&path).unwrap();
    session.export_page_csv(file).unwrap();

    // The written page parses back as a valid upload.
    let bytes = std::fs::read(&path).unwrap();
    let mut reread = Session::new(ExplorerConfig::default());
    reread
        .apply(SessionEvent::Upload {
            bytes,
            format: UploadFormat::Csv,
        })
        .unwrap();
    assert_eq!(reread.pager().total_rows(), 10);
}

#[test]
fn test_demo_dataset_is_explorable_offline() {
    let mut session = Session::new(ExplorerConfig::default());
    session.apply(SessionEvent::LoadDemo { rows: None }).unwrap();
    assert_eq!(session.pager().total_rows(), 1704);

    session
        .apply(SessionEvent::SetFilter {
            column: "continent".to_string(),
            predicate: FilterPredicate::Equals("Europe".to_string()),
        })
        .unwrap();
    let view = session.page_view().unwrap();
    assert!(view.total_rows > 0);
    assert!(view.total_rows < 1704);

    let kpis = session.kpis("country", "life_exp").unwrap();
    assert_eq!(kpis.rows, view.total_rows);
    assert!(kpis.distinct >= 1);
    assert!(kpis.median.is_some());
}

#[test]
fn test_chart_frame_ignores_pagination() {
    let mut session = session_with_sample();
    session.apply(SessionEvent::SetPageSize { size: 2 }).unwrap();
    let chart_df = session.chart_frame().unwrap().collect().unwrap();
    assert_eq!(chart_df.height(), 10);
}

#[test]
fn test_page_csv_string_matches_export() {
    let mut session = session_with_sample();
    let page = session.current_page().unwrap();
    let csv = datadeck::page_csv_string(&page, &CsvExportOptions::default()).unwrap();
    assert!(csv.starts_with("city,region,score\n"));
}
