//! Offline recommendation table.
//!
//! The built-in table is embedded at compile time from
//! `data/fallback.toml`; a replacement can be loaded from disk.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

const BUILTIN_TABLE: &str = include_str!("../data/fallback.toml");
const DEFAULT_ENTRY: &str = "neutral";

static BUILTIN: OnceLock<FallbackTable> = OnceLock::new();

/// One recommended video or search page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub link: String,
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("bad fallback table TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("fallback table needs a non-empty \"{DEFAULT_ENTRY}\" entry")]
    MissingDefault,
}

/// Label → ordered recommendations, with `neutral` as the catch-all.
#[derive(Debug, Clone)]
pub struct FallbackTable {
    entries: BTreeMap<String, Vec<Recommendation>>,
}

impl FallbackTable {
    /// The table shipped with the crate.
    pub fn builtin() -> &'static FallbackTable {
        BUILTIN.get_or_init(|| {
            FallbackTable::from_toml(BUILTIN_TABLE).expect("embedded fallback table is valid")
        })
    }

    /// Parse a table from TOML: one array of `{ title, link }` tables per label.
    pub fn from_toml(src: &str) -> Result<Self, TableError> {
        let raw: BTreeMap<String, Vec<Recommendation>> = toml::from_str(src)?;
        let entries: BTreeMap<String, Vec<Recommendation>> = raw
            .into_iter()
            .map(|(label, recs)| (label.to_ascii_lowercase(), recs))
            .collect();

        if entries.get(DEFAULT_ENTRY).map_or(true, Vec::is_empty) {
            return Err(TableError::MissingDefault);
        }

        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, TableError> {
        let src = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_toml(&src)?;
        tracing::info!(
            path = %path.display(),
            labels = table.entries.len(),
            "loaded fallback table"
        );
        Ok(table)
    }

    /// Recommendations for `label` (case-insensitive), else the `neutral` entry.
    pub fn lookup(&self, label: &str) -> &[Recommendation] {
        self.entries
            .get(&label.to_ascii_lowercase())
            .filter(|recs| !recs.is_empty())
            .or_else(|| self.entries.get(DEFAULT_ENTRY))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: [&str; 5] = ["neutral", "happy", "sad", "surprise", "angry"];

    #[test]
    fn test_builtin_covers_all_labels() {
        let table = FallbackTable::builtin();
        for label in LABELS {
            let recs = table.lookup(label);
            assert!(!recs.is_empty(), "no fallback for {label}");
            assert_eq!(recs, table.lookup(label), "unstable order for {label}");
        }
        assert_eq!(table.labels().count(), 5);
    }

    #[test]
    fn test_builtin_contents() {
        let table = FallbackTable::builtin();
        assert_eq!(table.lookup("happy")[0].title, "Upbeat Pop Mix");
        assert_eq!(
            table.lookup("neutral")[0].link,
            "https://www.youtube.com/results?search_query=chill+vibes+playlist"
        );
    }

    #[test]
    fn test_unknown_label_uses_neutral() {
        let table = FallbackTable::builtin();
        assert_eq!(table.lookup("bored"), table.lookup("neutral"));
        assert_eq!(table.lookup("7"), table.lookup("neutral"));
        assert_eq!(table.lookup(""), table.lookup("neutral"));
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let table = FallbackTable::builtin();
        assert_eq!(table.lookup("SAD"), table.lookup("sad"));
    }

    #[test]
    fn test_custom_table_requires_neutral() {
        let src = r#"
            [[happy]]
            title = "x"
            link = "https://example.com/x"
        "#;
        assert!(matches!(FallbackTable::from_toml(src), Err(TableError::MissingDefault)));
    }

    #[test]
    fn test_custom_table_order_preserved() {
        let src = r#"
            [[Neutral]]
            title = "first"
            link = "https://example.com/1"

            [[Neutral]]
            title = "second"
            link = "https://example.com/2"
        "#;
        let table = FallbackTable::from_toml(src).unwrap();
        let titles: Vec<&str> = table.lookup("happy").iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["first", "second"]);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            FallbackTable::load(Path::new("/nonexistent/fallback.toml")),
            Err(TableError::Io { .. })
        ));
    }
}
