//! Day-by-day "from" date seek over a live color-ratings page.
//!
//! The page shows cumulative totals from the "from" date up to the "to"
//! date. Advancing "from" one day at a time and subtracting each capture from
//! the previous one isolates the contribution of every single day.

use chrono::NaiveDate;

use crate::{
    differ::{DiffPolicy, close, diff},
    extract::extract,
    record::{ArchetypeSet, DailyRecord, Snapshot},
    scrape::WaitTimeout,
    util::{next_day, prev_day},
};

/// The operations the driver needs from a page. Every method blocks the
/// session until the page reached the requested state or a bounded wait ran
/// out, in which case the error is a [`WaitTimeout`].
pub trait RatingsPage {
    /// Currently selected (from, to) dates.
    async fn date_range(&mut self) -> anyhow::Result<(NaiveDate, NaiveDate)>;

    /// Current table HTML, waiting for the table to be present.
    async fn table(&mut self) -> anyhow::Result<String>;

    async fn set_from_date(&mut self, date: NaiveDate) -> anyhow::Result<()>;

    /// Waits until the table content differs from `previous` and has settled.
    async fn refreshed_table(&mut self, previous: &str) -> anyhow::Result<String>;
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// How many times a date is entered before giving up on a refresh.
    pub attempts: u32,
    /// Take the table as it is once the attempts ran out, instead of
    /// aborting. A day without games leaves the table unchanged.
    pub accept_unchanged: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            accept_unchanged: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The first capture had no rows.
    NoData,
    /// A capture came back empty: there is no data past that date.
    NoMoreData(NaiveDate),
    /// The "from" date passed the "to" date.
    ReachedEnd(NaiveDate),
}

#[derive(Debug)]
pub struct Scrape {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub records: Vec<DailyRecord>,
    pub stop: StopReason,
}

impl Scrape {
    pub fn days(&self) -> usize {
        let mut dates: Vec<_> = self.records.iter().map(|r| r.date).collect();
        dates.dedup();
        dates.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The scrape stopped part way. `partial` holds every day completed
    /// before the failure and can be persisted as is.
    #[error("scrape aborted at {at}: {cause:#}")]
    Aborted {
        at: NaiveDate,
        partial: Vec<DailyRecord>,
        cause: anyhow::Error,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct Request<'a> {
    /// Expansion code stored with every record.
    pub expansion: &'a str,
    /// Move the "from" filter here before the first capture.
    pub resume_from: Option<NaiveDate>,
    pub diff: DiffPolicy,
    pub retry: RetryPolicy,
}

enum State {
    Init,
    Seeking {
        cur: NaiveDate,
        to: NaiveDate,
        previous: Snapshot,
        previous_html: String,
    },
    Done(StopReason),
}

/// Enters `date` and waits for the table to follow. A refresh only counts
/// once the from input shows `date`; a table captured while the date is
/// still being typed is discarded and the date entered again.
async fn load_day<P: RatingsPage>(
    page: &mut P,
    date: NaiveDate,
    previous_html: &str,
    retry: RetryPolicy,
) -> anyhow::Result<String> {
    for attempt in 1..=retry.attempts.max(1) {
        page.set_from_date(date).await?;
        match page.refreshed_table(previous_html).await {
            Ok(html) => {
                let (from, _) = page.date_range().await?;
                if from == date {
                    return Ok(html);
                }
                tracing::warn!(target: "driver", "[{date}] attempt {attempt}/{}: page shows from date {from}", retry.attempts);
            }
            Err(err) if err.is::<WaitTimeout>() => {
                tracing::warn!(target: "driver", "[{date}] attempt {attempt}/{}: {err}", retry.attempts);
            }
            Err(err) => return Err(err),
        }
    }

    let (from, _) = page.date_range().await?;
    if from != date {
        anyhow::bail!("page kept from date {from} instead of {date}");
    }
    if retry.accept_unchanged {
        tracing::warn!(target: "driver", "[{date}] table unchanged, taking it as is");
        page.table().await
    } else {
        anyhow::bail!("table did not refresh for {date}")
    }
}

/// Runs one scrape session over `page`.
///
/// The filters other than the dates must already be set. Records come out
/// in date order, one batch of one record per archetype per day.
pub async fn run<P: RatingsPage>(page: &mut P, request: Request<'_>) -> Result<Scrape, ScrapeError> {
    let mut records = Vec::new();
    let mut archetypes = ArchetypeSet::default();
    let mut range: Option<(NaiveDate, NaiveDate)> = None;
    let mut state = State::Init;

    macro_rules! abort {
        ($at:expr, $result:expr) => {
            match $result {
                Ok(x) => x,
                Err(cause) => {
                    records.retain(|r: &DailyRecord| r.date < $at);
                    return Err(ScrapeError::Aborted { at: $at, partial: records, cause });
                }
            }
        };
    }

    let stop = loop {
        state = match state {
            State::Init => {
                let today = chrono::Local::now().date_naive();
                let mut html = abort!(today, page.table().await);
                if let Some(resume) = request.resume_from {
                    tracing::info!(target: "driver", "resuming from \x1b[36m{resume}\x1b[0m");
                    html = abort!(resume, load_day(page, resume, &html, request.retry).await);
                }

                let (from, to) = abort!(today, page.date_range().await);
                tracing::info!(target: "driver", "From: {from} To: {to}");
                if let Some(resume) = request.resume_from
                    && from != resume
                {
                    let cause = anyhow::anyhow!("page kept from date {from} instead of {resume}");
                    abort!(resume, Err::<(), _>(cause));
                }
                range = Some((from, to));

                let first = extract(&html);
                archetypes = ArchetypeSet::from(&first);
                if first.is_empty() || from > to {
                    State::Done(StopReason::NoData)
                } else {
                    tracing::info!(target: "driver", "{} archetypes in window", archetypes.len());
                    State::Seeking {
                        cur: next_day(from),
                        to,
                        previous: first,
                        previous_html: html,
                    }
                }
            }
            State::Seeking {
                cur,
                to,
                previous,
                previous_html,
            } => {
                let day = prev_day(cur);

                if cur > to {
                    records.append(&mut close(day, request.expansion, &previous, &archetypes));
                    State::Done(StopReason::ReachedEnd(day))
                } else {
                    tracing::info!(target: "driver", "\x1b[33mprocessing\x1b[0m {cur}");
                    let html = abort!(day, load_day(page, cur, &previous_html, request.retry).await);
                    let current = extract(&html);

                    records.append(&mut diff(
                        day,
                        request.expansion,
                        &previous,
                        &current,
                        &archetypes,
                        request.diff,
                    ));

                    if current.is_empty() {
                        tracing::info!(target: "driver", "no more data as of {cur}");
                        State::Done(StopReason::NoMoreData(day))
                    } else {
                        State::Seeking {
                            cur: next_day(cur),
                            to,
                            previous: current,
                            previous_html: html,
                        }
                    }
                }
            }
            State::Done(stop) => break stop,
        };
    };

    let (from, to) = range.unwrap_or_default();
    let scrape = Scrape {
        from,
        to,
        records,
        stop,
    };
    tracing::info!(target: "driver", "\x1b[36mdone\x1b[0m: {} days, {:?}", scrape.days(), scrape.stop);
    Ok(scrape)
}
