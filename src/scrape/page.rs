use core::time::Duration;
use std::{borrow::Cow, sync::Arc};

use chrono::NaiveDate;
use compact_str::CompactString;
use headless_chrome::Tab;
use serde::Deserialize;
use serde_json::Value;
use tokio::{
    task::spawn_blocking,
    time::{Instant, sleep},
};

use super::{Timeouts, WaitTimeout, evaluate, wait_for_async};
use crate::{
    driver::RatingsPage,
    util::{format_page_date, parse_page_date},
};

pub const FROM_XPATH: &str = r#"//*[@id="app"]/div/div[1]/div[4]/div/div[1]/div/input"#;
pub const TO_XPATH: &str = r#"//*[@id="app"]/div/div[1]/div[4]/div/div[3]/div/input"#;

const POLL: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Expansion,
    Format,
    UserGroup,
}

impl Filter {
    /// The `name` attribute of the select element.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Expansion => "expansion",
            Self::Format => "format",
            Self::UserGroup => "user-group",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Choice {
    pub value: CompactString,
    pub text: CompactString,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Selection {
    pub selected: CompactString,
    pub options: Vec<Choice>,
}

impl Selection {
    /// Display text of the selected option, falling back to its value.
    pub fn selected_text(&self) -> &str {
        self.options
            .iter()
            .find(|c| c.value == self.selected)
            .map_or(self.selected.as_str(), |c| c.text.as_str())
    }

    pub fn find_text(&self, text: &str) -> Option<&Choice> {
        self.options.iter().find(|c| c.text == text)
    }
}

#[derive(Clone, Debug)]
pub struct Selections {
    pub expansion: Selection,
    pub format: Selection,
    pub group: Selection,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

fn js_str(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}

fn select_expr(filter: Filter) -> String {
    let selector = js_str(&format!("select[name=\"{}\"]", filter.name()));
    format!(
        "(() => {{ const el = document.querySelector({selector}); \
         if (!el || el.disabled) return null; \
         return JSON.stringify({{ selected: el.value, \
         options: [...el.options].map(o => ({{ value: o.value, text: o.text.trim() }})) }}); }})()"
    )
}

fn set_select_expr(filter: Filter, value: &str) -> String {
    let selector = js_str(&format!("select[name=\"{}\"]", filter.name()));
    let value = js_str(value);
    format!(
        "(() => {{ const el = document.querySelector({selector}); \
         if (!el) return null; \
         Object.getOwnPropertyDescriptor(HTMLSelectElement.prototype, 'value').set.call(el, {value}); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
         return el.value; }})()"
    )
}

fn input_expr(xpath: &str) -> String {
    let xpath = js_str(xpath);
    format!(
        "(() => {{ const el = document.evaluate({xpath}, document, null, \
         XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; \
         return el && !el.disabled ? el.value : null; }})()"
    )
}

const TABLE_EXPR: &str =
    "(() => { const t = document.querySelector('table'); return t ? t.innerHTML : null; })()";

/// Successive reads of the table after a change of filters. The content is
/// settled once two reads in a row agree and differ from the content before
/// the change. A missing table element is a page in the middle of a reload,
/// never an empty table.
#[derive(Debug, Default)]
struct Settle {
    last: Option<String>,
}

impl Settle {
    fn observe(&mut self, previous: &str, read: Option<String>) -> Option<String> {
        match read {
            Some(html) if html != previous => {
                if self.last.as_deref() == Some(html.as_str()) {
                    return Some(html);
                }
                self.last = Some(html);
            }
            _ => self.last = None,
        }
        None
    }
}

/// The color-ratings page in a live tab.
pub struct ChromePage {
    tab: Arc<Tab>,
    timeouts: Timeouts,
}

impl ChromePage {
    pub const fn new(tab: Arc<Tab>, timeouts: Timeouts) -> Self {
        Self { tab, timeouts }
    }

    pub async fn selection(&self, filter: Filter) -> anyhow::Result<Selection> {
        let json = wait_for_async(
            &self.tab,
            &select_expr(filter),
            Cow::Owned(format!("select {}", filter.name())),
            self.timeouts.control,
        )
        .await?;
        Ok(serde_json::from_str(&json)?)
    }

    pub async fn selections(&mut self) -> anyhow::Result<Selections> {
        let (from, to) = self.date_range().await?;
        Ok(Selections {
            expansion: self.selection(Filter::Expansion).await?,
            format: self.selection(Filter::Format).await?,
            group: self.selection(Filter::UserGroup).await?,
            from,
            to,
        })
    }

    /// Selects `value` and waits for the table to follow. Nothing happens if
    /// it is selected already.
    pub async fn select(&mut self, filter: Filter, value: &str) -> anyhow::Result<()> {
        let current = self.selection(filter).await?;
        if current.selected == value {
            return Ok(());
        }
        if !current.options.iter().any(|c| c.value == value) {
            anyhow::bail!("{} has no option {value:?}", filter.name());
        }

        let previous = self.table_now().await?.unwrap_or_default();
        tracing::info!(target: "page", "{} -> \x1b[36m{value}\x1b[0m", filter.name());
        evaluate(&self.tab, set_select_expr(filter, value)).await?;
        self.refreshed_table(&previous).await.map(|_| ())
    }

    async fn input_date(&self, xpath: &'static str) -> anyhow::Result<NaiveDate> {
        let raw = wait_for_async(
            &self.tab,
            &input_expr(xpath),
            Cow::Borrowed("date input"),
            self.timeouts.control,
        )
        .await?;
        parse_page_date(&raw).ok_or_else(|| anyhow::anyhow!("bad date {raw:?}"))
    }

    /// The table content, `None` while there is no table element.
    async fn table_now(&self) -> anyhow::Result<Option<String>> {
        match evaluate(&self.tab, TABLE_EXPR.to_owned()).await? {
            Value::String(s) => Ok(Some(s)),
            Value::Null => Ok(None),
            value => anyhow::bail!("not a string: {value}"),
        }
    }
}

impl RatingsPage for ChromePage {
    async fn date_range(&mut self) -> anyhow::Result<(NaiveDate, NaiveDate)> {
        Ok((self.input_date(FROM_XPATH).await?, self.input_date(TO_XPATH).await?))
    }

    async fn table(&mut self) -> anyhow::Result<String> {
        wait_for_async(&self.tab, TABLE_EXPR, Cow::Borrowed("table"), self.timeouts.table).await
    }

    async fn set_from_date(&mut self, date: NaiveDate) -> anyhow::Result<()> {
        self.input_date(FROM_XPATH).await?;

        let tab = Arc::clone(&self.tab);
        let text = format_page_date(date);
        spawn_blocking(move || -> anyhow::Result<()> {
            let input = tab.find_element_by_xpath(FROM_XPATH)?;
            input.click()?;
            input.call_js_fn("function () { this.select(); }", Vec::new(), false)?;
            tab.type_str(&text)?;
            Ok(())
        })
        .await?
    }

    async fn refreshed_table(&mut self, previous: &str) -> anyhow::Result<String> {
        let deadline = Instant::now() + self.timeouts.table;
        let mut settle = Settle::default();

        loop {
            if let Some(html) = settle.observe(previous, self.table_now().await?) {
                return Ok(html);
            }

            if Instant::now() >= deadline {
                return Err(WaitTimeout {
                    what: Cow::Borrowed("table refresh"),
                    after: self.timeouts.table,
                }
                .into());
            }
            sleep(POLL).await;
        }
    }
}
