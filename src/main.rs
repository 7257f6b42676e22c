use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use datadeck::{
    ConfigManager, ExplorerConfig, FilterPredicate, Session, SessionEvent, SortKey, UploadFormat,
};
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "datadeck: explore a tabular dataset page by page")]
struct Args {
    /// CSV or Parquet file to explore; the bundled demo dataset when omitted
    path: Option<PathBuf>,

    /// Declared format of the input file (inferred from the extension when omitted)
    #[arg(long = "format")]
    format: Option<String>,

    /// Rows per page
    #[arg(long = "page-size")]
    page_size: Option<usize>,

    /// Page to show, 0-based
    #[arg(long = "page")]
    page: Option<usize>,

    /// Equality filter as column=value (repeatable)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Substring filter as column=needle (repeatable)
    #[arg(long = "contains")]
    contains: Vec<String>,

    /// Sort key as column or column:desc (repeatable)
    #[arg(long = "sort")]
    sort: Vec<String>,

    /// Demo dataset row target when no file is given
    #[arg(long = "demo-rows")]
    demo_rows: Option<usize>,

    /// Metric line over the filtered set: distinct and value columns as group,value
    #[arg(long = "kpi")]
    kpi: Option<String>,

    /// Write the visible page as CSV to this path
    #[arg(long = "export")]
    export: Option<PathBuf>,
}

fn split_pair<'a>(arg: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    arg.split_once('=')
        .or_else(|| arg.split_once(','))
        .ok_or_else(|| eyre!("expected {} as name=value, got '{}'", what, arg))
}

fn sort_key(arg: &str) -> Result<SortKey> {
    match arg.split_once(':') {
        None => Ok(SortKey::ascending(arg)),
        Some((column, "asc")) => Ok(SortKey::ascending(column)),
        Some((column, "desc")) => Ok(SortKey::descending(column)),
        Some((_, other)) => Err(eyre!("sort direction must be asc or desc, got '{}'", other)),
    }
}

fn load_config() -> ExplorerConfig {
    ConfigManager::new("datadeck")
        .and_then(|manager| ExplorerConfig::load_or_default(&manager))
        .unwrap_or_default()
}

fn open_event(args: &Args) -> Result<SessionEvent> {
    let Some(path) = &args.path else {
        // The configured target applies when --demo-rows is not given.
        return Ok(SessionEvent::LoadDemo {
            rows: args.demo_rows,
        });
    };
    let format = match &args.format {
        Some(name) => UploadFormat::from_name(name)?,
        None => UploadFormat::from_path(path)
            .ok_or_else(|| eyre!("cannot infer format of '{}'; pass --format", path.display()))?,
    };
    let bytes = std::fs::read(path)?;
    Ok(SessionEvent::Upload { bytes, format })
}

fn run(args: &Args) -> Result<()> {
    let mut config = load_config();
    if let Some(size) = args.page_size {
        config.page_size = size;
    }

    let mut session = Session::new(config);
    session.apply(open_event(args)?)?;

    for filter in &args.filters {
        let (column, value) = split_pair(filter, "--filter")?;
        session.apply(SessionEvent::SetFilter {
            column: column.to_string(),
            predicate: FilterPredicate::Equals(value.to_string()),
        })?;
    }
    for filter in &args.contains {
        let (column, needle) = split_pair(filter, "--contains")?;
        session.apply(SessionEvent::SetFilter {
            column: column.to_string(),
            predicate: FilterPredicate::Contains(needle.to_string()),
        })?;
    }
    if !args.sort.is_empty() {
        let keys = args
            .sort
            .iter()
            .map(|s| sort_key(s))
            .collect::<Result<Vec<_>>>()?;
        session.apply(SessionEvent::SetSort { keys })?;
    }
    if let Some(page) = args.page {
        session.apply(SessionEvent::JumpToPage { page })?;
    }

    let view = session.page_view()?;
    println!("{}", view.result.rows);
    println!(
        "page {} of {} | {} rows under current filters | {} rows shown",
        view.page,
        view.last_page(),
        view.total_rows,
        view.result.len()
    );

    if let Some(kpi) = &args.kpi {
        let (group, value) = split_pair(kpi, "--kpi")?;
        let kpis = session.kpis(group, value)?;
        let median = kpis
            .median
            .map(|m| format!("{:.1}", m))
            .unwrap_or_else(|| "n/a".to_string());
        let sum = kpis
            .sum
            .map(|s| format!("{:.0}", s))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "kpi: {} distinct {} | median {} {} | total {}",
            kpis.distinct, group, value, median, sum
        );
    }

    if let Some(path) = &args.export {
        let file = File::create(path)?;
        session.export_page_csv(file)?;
        println!("wrote visible page to {}", path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    run(&args)
}
