//! Per (expansion, format, group) CSV cache of daily records.

use std::{fs, io, path::PathBuf};

use chrono::NaiveDate;
use compact_str::CompactString;

use crate::{
    record::DailyRecord,
    util::{CACHE_DATE, next_day, prev_day},
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub expansion: CompactString,
    pub format: CompactString,
    /// Display text of the user group, e.g. `All Users`.
    pub group: CompactString,
}

impl CacheKey {
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.csv", self.expansion, self.format, self.group)
    }
}

#[derive(Clone, Debug)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// The whole table of `key`, or `None` when nothing was cached yet. A
    /// table without rows counts as nothing cached, so the next run scrapes
    /// the key in full.
    pub fn load(&self, key: &CacheKey) -> anyhow::Result<Option<Vec<DailyRecord>>> {
        let path = self.path(key);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let records = read_records(file)?;
        if records.is_empty() {
            tracing::warn!(target: "cache", "{} has no rows, ignoring it", path.display());
            return Ok(None);
        }
        tracing::info!(target: "cache", "loaded {} rows from {}", records.len(), path.display());
        Ok(Some(records))
    }

    /// Rewrites the whole table of `key`. An empty table is not written.
    pub fn save(&self, key: &CacheKey, records: &[DailyRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            tracing::info!(target: "cache", "nothing to save for {}", key.file_name());
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let tmp = path.with_extension("csv.tmp");

        write_records(fs::File::create(&tmp)?, records)?;
        fs::rename(&tmp, &path)?;

        tracing::info!(target: "cache", "\x1b[36msaved {} rows\x1b[0m to {}", records.len(), path.display());
        Ok(())
    }
}

// The leading index column is unnamed and carries nothing, it is dropped
// before deserializing.
fn read_records(reader: impl io::Read) -> anyhow::Result<Vec<DailyRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let body = headers.iter().skip(1).collect::<csv::StringRecord>();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let fields = row.iter().skip(1).collect::<csv::StringRecord>();
        let record: DailyRecord = fields
            .deserialize(Some(&body))
            .map_err(|e| anyhow::anyhow!("row {}: {e}", line + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn write_records(writer: impl io::Write, records: &[DailyRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["", "date", "format", "deck", "wins", "games"])?;
    for (index, record) in records.iter().enumerate() {
        writer.write_record([
            index.to_string(),
            record.date.format(CACHE_DATE).to_string(),
            record.format.to_string(),
            record.deck.to_string(),
            record.wins.to_string(),
            record.games.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn max_date(records: &[DailyRecord]) -> Option<NaiveDate> {
    records.iter().map(|r| r.date).max()
}

/// Whether a cached table should be extended with a fresh scrape: it ends
/// before yesterday and the live page shows the same expansion.
pub fn needs_update(
    records: &[DailyRecord],
    today: NaiveDate,
    selected_expansion: &str,
    page_expansion: &str,
) -> bool {
    max_date(records).is_some_and(|max| max < prev_day(today)) && selected_expansion == page_expansion
}

/// First date to scrape when extending `records`.
pub fn resume_date(records: &[DailyRecord]) -> Option<NaiveDate> {
    max_date(records).map(next_day)
}

/// Concatenation without deduplication. `new` must start after the last
/// cached date, see [`resume_date`].
pub fn append(mut records: Vec<DailyRecord>, new: Vec<DailyRecord>) -> Vec<DailyRecord> {
    records.extend(new);
    records
}
