use core::time::Duration;
use std::{
    borrow::Cow,
    ffi::OsStr,
    sync::{Arc, PoisonError},
};

use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tokio::{task::spawn_blocking, time::{Instant, sleep}};

use super::WaitTimeout;

pub fn puppeteer(headless: bool) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![OsStr::new("--disable-blink-features=AutomationControlled")],
        headless,
        window_size: Some((1440, 1000)),
        idle_browser_timeout: const { Duration::from_secs(600) },
        ..LaunchOptions::default()
    })
}

/// Opens a tab for the run and closes the ones the browser started with.
/// The tab list lock is released before any tab is closed.
pub fn fresh_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    let tab = browser.new_tab()?;

    let stale: Vec<Arc<Tab>> = browser
        .get_tabs()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|other| !Arc::ptr_eq(other, &tab))
        .cloned()
        .collect();
    for other in stale {
        other.close(true)?;
    }

    Ok(tab)
}

pub async fn navigate_to(tab: &Arc<Tab>, url: Cow<'static, str>) -> anyhow::Result<()> {
    let tab = Arc::clone(tab);

    spawn_blocking(move || -> anyhow::Result<()> {
        tab.navigate_to(&url)?.wait_until_navigated()?;
        Ok(())
    })
    .await?
}

/// Evaluates `expression` in the page. Only primitive results come back by
/// value, so expressions that build objects should `JSON.stringify` them.
pub async fn evaluate(tab: &Arc<Tab>, expression: String) -> anyhow::Result<Value> {
    let tab = Arc::clone(tab);

    let ret = spawn_blocking(move || tab.evaluate(&expression, false)).await??;

    Ok(ret.value.unwrap_or(Value::Null))
}

/// Polls `expression` until it yields a string, for at most `timeout`.
pub async fn wait_for_async(
    tab: &Arc<Tab>,
    expression: &str,
    what: Cow<'static, str>,
    timeout: Duration,
) -> anyhow::Result<String> {
    const PERIOD: Duration = Duration::from_millis(1832 / 4);

    let deadline = Instant::now() + timeout;
    loop {
        if let Value::String(s) = evaluate(tab, expression.to_owned()).await? {
            break Ok(s);
        }

        if Instant::now() >= deadline {
            break Err(WaitTimeout { what, after: timeout }.into());
        }
        sleep(PERIOD).await;
    }
}
