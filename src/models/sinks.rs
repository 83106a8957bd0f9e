//! Storage destinations and the set of enabled ones.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An independently togglable storage destination.
///
/// Variant order is the order the storage router runs them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sink {
    /// `raw_data/<id>/data.json` plus the poster image
    LocalRawFiles,
    /// Upload of the local artifacts to a bucket
    ObjectStore,
    /// One row per film in the `film_data` table
    RelationalTable,
    /// One row per film appended to `film_data.csv`
    FlatFile,
    /// Removal of the local artifacts once remote copies exist
    LocalCleanup,
}

impl Sink {
    pub const ALL: [Sink; 5] = [
        Sink::LocalRawFiles,
        Sink::ObjectStore,
        Sink::RelationalTable,
        Sink::FlatFile,
        Sink::LocalCleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sink::LocalRawFiles => "local_raw_files",
            Sink::ObjectStore => "object_store",
            Sink::RelationalTable => "relational_table",
            Sink::FlatFile => "flat_file",
            Sink::LocalCleanup => "local_cleanup",
        }
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sink {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Sink::ALL
            .into_iter()
            .find(|sink| sink.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Sink::ALL.iter().map(Sink::as_str).collect();
                format!("unknown sink '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// The destinations a run writes to, passed once to the storage router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SinkSet(BTreeSet<Sink>);

impl SinkSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, sink: Sink) -> bool {
        self.0.contains(&sink)
    }

    pub fn with(mut self, sink: Sink) -> Self {
        self.0.insert(sink);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Enabled sinks in execution order.
    pub fn iter(&self) -> impl Iterator<Item = Sink> + '_ {
        self.0.iter().copied()
    }

    /// Whether the local artifacts must be written, either to keep them or
    /// to stage them for upload.
    pub fn needs_local_artifacts(&self) -> bool {
        self.contains(Sink::LocalRawFiles) || self.contains(Sink::ObjectStore)
    }
}

impl Default for SinkSet {
    fn default() -> Self {
        Self::empty().with(Sink::LocalRawFiles)
    }
}

impl FromIterator<Sink> for SinkSet {
    fn from_iter<I: IntoIterator<Item = Sink>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for SinkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        let names: Vec<_> = self.iter().map(|s| s.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}
