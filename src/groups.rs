use std::{fs::File, io::BufReader, path::Path};

use compact_str::CompactString;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// The mapping shipped with the crate.
pub const DEFAULT_GROUPS: &str = include_str!("../groups.json");

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: CompactString,
    /// `#rrggbb`
    pub color: CompactString,
}

/// Archetype label -> color-pair bucket, with the buckets' fixed order and
/// chart colors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColorGroups {
    pub buckets: Vec<Bucket>,
    /// Bucket of labels missing from `archetypes`.
    pub fallback: CompactString,
    pub archetypes: HashMap<CompactString, CompactString>,
}

impl ColorGroups {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let groups: Self = serde_json::from_str(json)?;
        groups.validate()?;
        Ok(groups)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let groups: Self = serde_json::from_reader(reader)?;
        groups.validate()?;
        tracing::info!(target: "groups", "{} archetypes mapped from {}", groups.archetypes.len(), path.display());
        Ok(groups)
    }

    /// `path` if given, the built-in mapping otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_json(DEFAULT_GROUPS),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.position(&self.fallback).is_none() {
            anyhow::bail!("fallback bucket {} is not listed", self.fallback);
        }
        for (archetype, bucket) in &self.archetypes {
            if self.position(bucket).is_none() {
                anyhow::bail!("{archetype} maps to unlisted bucket {bucket}");
            }
        }
        for bucket in &self.buckets {
            if parse_color(&bucket.color).is_none() {
                anyhow::bail!("bad color {} for {}", bucket.color, bucket.name);
            }
        }
        Ok(())
    }

    pub fn bucket_of(&self, archetype: &str) -> &str {
        self.archetypes.get(archetype).unwrap_or_else(|| {
            tracing::debug!(target: "groups", "{archetype} unmapped, using {}", self.fallback);
            &self.fallback
        })
    }

    /// Index of `bucket` in the fixed order.
    pub fn position(&self, bucket: &str) -> Option<usize> {
        self.buckets.iter().position(|b| b.name == bucket)
    }

    pub fn color_of(&self, bucket: &str) -> Option<(u8, u8, u8)> {
        self.buckets
            .iter()
            .find(|b| b.name == bucket)
            .and_then(|b| parse_color(&b.color))
    }
}

impl Default for ColorGroups {
    fn default() -> Self {
        #[allow(clippy::unwrap_used)]
        Self::from_json(DEFAULT_GROUPS).unwrap()
    }
}

fn parse_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping_is_valid() {
        let groups = ColorGroups::default();

        assert_eq!(groups.buckets.len(), 12);
        assert_eq!(groups.bucket_of("Azorius (WU) + Splash"), "WU");
        assert_eq!(groups.bucket_of("Mono-Green"), "Mono");
        assert_eq!(groups.bucket_of("Five-color"), "Other");
        assert_eq!(groups.bucket_of("Some Future Archetype"), "Other");
        assert_eq!(groups.position("Mono"), Some(0));
        assert_eq!(groups.color_of("Other"), Some((0xff, 0x99, 0x00)));
    }

    #[test]
    fn unlisted_buckets_are_rejected() {
        let json = r##"{"buckets":[{"name":"A","color":"#000000"}],"fallback":"A","archetypes":{"x":"B"}}"##;
        assert!(ColorGroups::from_json(json).is_err());

        let json = r##"{"buckets":[{"name":"A","color":"#000000"}],"fallback":"Z","archetypes":{}}"##;
        assert!(ColorGroups::from_json(json).is_err());

        let json = r##"{"buckets":[{"name":"A","color":"black"}],"fallback":"A","archetypes":{}}"##;
        assert!(ColorGroups::from_json(json).is_err());
    }

    #[test]
    fn mapping_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.json");
        std::fs::write(
            &path,
            r##"{"buckets":[{"name":"Aggro","color":"#ff0000"},{"name":"Rest","color":"#00ff00"}],"fallback":"Rest","archetypes":{"Mono-Red":"Aggro"}}"##,
        )
        .unwrap();

        let groups = ColorGroups::load(Some(&path)).unwrap();
        assert_eq!(groups.bucket_of("Mono-Red"), "Aggro");
        assert_eq!(groups.bucket_of("Mono-Blue"), "Rest");
    }
}
