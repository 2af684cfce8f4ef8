mod prompt;

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use mgt::{
    aggregate::aggregate,
    cache::{self, CacheKey, CacheStore},
    differ::{DiffPolicy, LateAppearance, NegativeDelta},
    driver::{self, Request, RetryPolicy, ScrapeError},
    groups::ColorGroups,
    plot::{self, Charts},
    record::DailyRecord,
    scrape::{COLOR_RATINGS_URL, ChromePage, Filter, Selection, Session, Timeouts},
    util::prev_day,
};

/// Default user group of the `plot` subcommand.
const ALL_USERS: &str = "All Users";

#[derive(clap::Parser)]
#[command(version, about)]
struct Args {
    /// Directory of the CSV caches.
    #[arg(long, env = "MGT_CACHE_DIR", default_value = "cache")]
    cache_dir: PathBuf,
    /// Directory the charts are written to.
    #[arg(long, env = "MGT_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,
    /// Archetype to bucket mapping (JSON); the built-in one if omitted.
    #[arg(long, env = "MGT_GROUPS", value_name = "file")]
    groups: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Filters {
    /// Expansion code, prompted for if omitted.
    #[arg(short, long)]
    expansion: Option<CompactString>,
    /// Event format, prompted for if omitted.
    #[arg(short, long)]
    format: Option<CompactString>,
    /// User group as displayed, e.g. "All Users"; prompted for if omitted.
    #[arg(short, long)]
    group: Option<CompactString>,
}

#[derive(clap::Args)]
struct RunArgs {
    #[command(flatten)]
    filters: Filters,
    #[arg(long, env = "MGT_URL", default_value = COLOR_RATINGS_URL)]
    url: String,
    #[arg(long, env = "MGT_HEADLESS")]
    headless: bool,
    /// Clamp negative daily deltas to zero.
    #[arg(long)]
    clamp_negative: bool,
    /// Record nothing for archetypes that show up after the first day.
    #[arg(long)]
    skip_late: bool,
    /// Times a date is entered before a refresh is given up.
    #[arg(long, default_value_t = 3)]
    attempts: u32,
    /// Abort instead of taking an unchanged table as a day without games.
    #[arg(long)]
    abort_unchanged: bool,
    /// Seconds to wait for the filter controls.
    #[arg(long, default_value_t = 10)]
    control_timeout: u64,
    /// Seconds to wait for the table.
    #[arg(long, default_value_t = 30)]
    table_timeout: u64,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Scrape (or extend the cache), then plot.
    Run(RunArgs),
    /// Plot a cached table without opening a browser.
    Plot {
        #[arg(short, long)]
        expansion: CompactString,
        #[arg(short, long)]
        format: CompactString,
        #[arg(short, long, default_value = ALL_USERS)]
        group: CompactString,
    },
}

fn pick(
    filter: Filter,
    message: &str,
    selection: &Selection,
    given: Option<CompactString>,
    by_text: bool,
) -> anyhow::Result<CompactString> {
    let label = |c: &mgt::scrape::Choice| if by_text { c.text.clone() } else { c.value.clone() };
    let choices: Vec<CompactString> = selection.options.iter().map(label).collect();

    if let Some(given) = given {
        if !choices.contains(&given) {
            anyhow::bail!("{} has no option {given:?}, expected one of {choices:?}", filter.name());
        }
        return Ok(given);
    }

    let refs: Vec<&str> = choices.iter().map(CompactString::as_str).collect();
    let default = selection.options.iter().position(|c| c.value == selection.selected);
    let i = prompt::choose_stdin(message, &refs, default)?;
    Ok(choices[i].clone())
}

async fn scrape(
    page: &mut ChromePage,
    key: &CacheKey,
    group_value: &str,
    request: Request<'_>,
) -> Result<Vec<DailyRecord>, ScrapeError> {
    let selected: anyhow::Result<()> = async {
        page.select(Filter::Expansion, &key.expansion).await?;
        page.select(Filter::Format, &key.format).await?;
        page.select(Filter::UserGroup, group_value).await?;
        Ok(())
    }
    .await;
    if let Err(cause) = selected {
        return Err(ScrapeError::Aborted {
            at: request.resume_from.unwrap_or_else(|| chrono::Local::now().date_naive()),
            partial: Vec::new(),
            cause,
        });
    }

    tracing::info!(target: "main", "Scraping: {} {} {}", key.expansion, key.format, key.group);
    driver::run(page, request).await.map(|scrape| scrape.records)
}

async fn run(args: &RunArgs, cache_dir: &Path) -> anyhow::Result<(CacheKey, Vec<DailyRecord>)> {
    let RunArgs {
        filters,
        url,
        headless,
        clamp_negative,
        skip_late,
        attempts,
        abort_unchanged,
        control_timeout,
        table_timeout,
    } = args;

    let timeouts = Timeouts {
        control: core::time::Duration::from_secs(*control_timeout),
        table: core::time::Duration::from_secs(*table_timeout),
    };
    let session = Session::open(*headless, url).await?;
    let mut page = session.page(timeouts);

    let current = page.selections().await?;
    tracing::info!(
        target: "main",
        "Current Selections:\n  Expansion: {}\n  Format: {}\n  User Group: {}\n  From: {} To: {}",
        current.expansion.selected,
        current.format.selected,
        current.group.selected_text(),
        current.from,
        current.to,
    );

    let expansion = pick(Filter::Expansion, "Choose Expansion", &current.expansion, filters.expansion.clone(), false)?;
    let format = pick(Filter::Format, "Choose Format", &current.format, filters.format.clone(), false)?;
    let group = pick(Filter::UserGroup, "Choose User Group", &current.group, filters.group.clone(), true)?;
    let group_value = current
        .group
        .find_text(&group)
        .map_or_else(|| CompactString::const_new(""), |c| c.value.clone());

    let key = CacheKey {
        expansion,
        format,
        group,
    };
    let store = CacheStore::new(cache_dir);
    let request = Request {
        expansion: &key.expansion,
        resume_from: None,
        diff: DiffPolicy {
            negative: if *clamp_negative { NegativeDelta::Clamp } else { NegativeDelta::Keep },
            late: if *skip_late { LateAppearance::Skip } else { LateAppearance::Raw },
        },
        retry: RetryPolicy {
            attempts: *attempts,
            accept_unchanged: !abort_unchanged,
        },
    };
    let today = chrono::Local::now().date_naive();

    let (cached, request) = match store.load(&key)? {
        Some(records) => {
            if let Some(max) = cache::max_date(&records) {
                tracing::info!(target: "main", "cached up to {max}, yesterday was {}", prev_day(today));
            }
            if cache::needs_update(&records, today, &key.expansion, &current.expansion.selected) {
                tracing::info!(target: "main", "\x1b[33mUpdating the data with latest.\x1b[0m");
                let resume_from = cache::resume_date(&records);
                (records, Some(Request { resume_from, ..request }))
            } else {
                (records, None)
            }
        }
        None => (Vec::new(), Some(request)),
    };

    let Some(request) = request else {
        return Ok((key, cached));
    };

    let records = match scrape(&mut page, &key, &group_value, request).await {
        Ok(new) => cache::append(cached, new),
        Err(ScrapeError::Aborted { at, partial, cause }) => {
            log::error!(target: "main", "\x1b[31maborted\x1b[0m at {at} with {} records: {cause:#}", partial.len());
            if !partial.is_empty() {
                store.save(&key, &cache::append(cached, partial))?;
            }
            return Err(cause.context(format!("scrape aborted at {at}, completed days were saved")));
        }
    };
    drop(session);

    if records.is_empty() {
        anyhow::bail!("the page has no data for {} {} {}", key.expansion, key.format, key.group);
    }
    store.save(&key, &records)?;
    Ok((key, records))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let groups = ColorGroups::load(args.groups.as_deref())?;

    let (key, records) = match &args.command {
        Commands::Run(run_args) => run(run_args, &args.cache_dir).await?,
        Commands::Plot {
            expansion,
            format,
            group,
        } => {
            let key = CacheKey {
                expansion: expansion.clone(),
                format: format.clone(),
                group: group.clone(),
            };
            let records = CacheStore::new(&args.cache_dir)
                .load(&key)?
                .ok_or_else(|| anyhow::anyhow!("no cache for {}", key.file_name()))?;
            (key, records)
        }
    };

    let agg = aggregate(&records, &groups);
    let title = format!("{} {} {}", key.expansion, key.format, key.group);
    let stem = key.file_name();
    let charts = Charts::in_dir(&args.out_dir, stem.trim_end_matches(".csv"));
    std::fs::create_dir_all(&args.out_dir)?;
    plot::draw(&charts, &title, &agg, &groups)?;

    tracing::info!(
        target: "main",
        "\x1b[36mcharts:\x1b[0m {} {}",
        charts.share.display(),
        charts.win_rate.display(),
    );
    Ok(())
}
