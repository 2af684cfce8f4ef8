use chrono::NaiveDate;
use compact_str::CompactString;
use hashbrown::HashMap;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub wins: u64,
    pub games: u64,
}

impl Tally {
    pub const fn new(wins: u64, games: u64) -> Self {
        Self { wins, games }
    }
}

/// Cumulative totals of one table capture, in the page's row order.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    order: Vec<CompactString>,
    tallies: HashMap<CompactString, Tally>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later rows with an already seen label overwrite the earlier tally but
    /// keep its position.
    pub fn insert(&mut self, archetype: CompactString, tally: Tally) {
        if self.tallies.insert(archetype.clone(), tally).is_none() {
            self.order.push(archetype);
        }
    }

    pub fn get(&self, archetype: &str) -> Option<Tally> {
        self.tallies.get(archetype).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn archetypes(&self) -> impl Iterator<Item = &CompactString> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompactString, Tally)> {
        self.order.iter().map(|name| (name, self.tallies[name]))
    }
}

impl<S: Into<CompactString>> FromIterator<(S, Tally)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (S, Tally)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (archetype, tally) in iter {
            snapshot.insert(archetype.into(), tally);
        }
        snapshot
    }
}

/// Archetypes of the first snapshot of a session; the only ones differenced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchetypeSet(Vec<CompactString>);

impl ArchetypeSet {
    pub fn contains(&self, archetype: &str) -> bool {
        self.0.iter().any(|name| name == archetype)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, CompactString> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&Snapshot> for ArchetypeSet {
    fn from(snapshot: &Snapshot) -> Self {
        Self(snapshot.archetypes().cloned().collect())
    }
}

impl<S: Into<CompactString>> FromIterator<S> for ArchetypeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut names: Vec<CompactString> = Vec::new();
        for name in iter {
            let name = name.into();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self(names)
    }
}

/// Incremental counts of one archetype on one calendar day. `format` holds
/// the expansion code, matching the cache column of the same name.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DailyRecord {
    #[serde(deserialize_with = "cache_date::deserialize")]
    pub date: NaiveDate,
    pub format: CompactString,
    pub deck: CompactString,
    pub wins: i64,
    pub games: i64,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, format: &str, deck: &str, wins: i64, games: i64) -> Self {
        Self {
            date,
            format: format.into(),
            deck: deck.into(),
            wins,
            games,
        }
    }
}

mod cache_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, de::Error};

    use crate::util::parse_cache_date;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_cache_date(&raw).ok_or_else(|| D::Error::custom(format!("bad date {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_keeps_row_order() {
        let snapshot: Snapshot = [
            ("Mono-Red", Tally::new(40, 100)),
            ("Azorius (WU)", Tally::new(5, 10)),
            ("Mono-Red", Tally::new(41, 101)),
        ]
        .into_iter()
        .collect();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("Mono-Red"), Some(Tally::new(41, 101)));
        let names: Vec<_> = snapshot.archetypes().map(CompactString::as_str).collect();
        assert_eq!(names, ["Mono-Red", "Azorius (WU)"]);
    }

    #[test]
    fn archetype_set_from_snapshot() {
        let snapshot: Snapshot = [("Gruul (RG)", Tally::new(1, 2))].into_iter().collect();
        let set = ArchetypeSet::from(&snapshot);
        assert!(set.contains("Gruul (RG)"));
        assert!(!set.contains("Five-color"));
    }
}
