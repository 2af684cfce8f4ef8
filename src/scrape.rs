use core::time::Duration;
use std::{borrow::Cow, sync::Arc};

use headless_chrome::{Browser, Tab};

mod page;
mod puppeteer;

pub use page::{ChromePage, Choice, Filter, Selection, Selections};
pub use puppeteer::{evaluate, fresh_tab, navigate_to, puppeteer, wait_for_async};

pub const COLOR_RATINGS_URL: &str = "https://www.17lands.com/color_ratings";

/// Bounded waits of the page automation.
#[derive(Clone, Copy, Debug)]
pub struct Timeouts {
    /// Filter controls becoming available.
    pub control: Duration,
    /// Table presence and refresh.
    pub table: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            control: const { Duration::from_secs(10) },
            table: const { Duration::from_secs(30) },
        }
    }
}

/// A bounded wait ran out. Callers decide between retrying and aborting.
#[derive(Debug, thiserror::Error)]
#[error("timed out after {after:?} waiting for {what}")]
pub struct WaitTimeout {
    pub what: Cow<'static, str>,
    pub after: Duration,
}

/// The browser process and the one tab driven for a run. Dropping the session
/// closes both, on error paths as well.
pub struct Session {
    browser: Browser,
    tab: Arc<Tab>,
}

impl Session {
    pub async fn open(headless: bool, url: &str) -> anyhow::Result<Self> {
        let browser = puppeteer(headless)?;
        let tab = fresh_tab(&browser)?;
        tracing::info!(target: "session", "opening \x1b[36m{url}\x1b[0m ...");
        navigate_to(&tab, Cow::Owned(url.to_owned())).await?;
        Ok(Self { browser, tab })
    }

    pub fn page(&self, timeouts: Timeouts) -> ChromePage {
        ChromePage::new(Arc::clone(&self.tab), timeouts)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            tracing::debug!(target: "session", "closing tab: {e}");
        }
        let version = self.browser.get_version().map(|v| v.product).unwrap_or_default();
        tracing::info!(target: "session", "closing browser {version}");
    }
}
