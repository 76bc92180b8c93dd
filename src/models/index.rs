use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static definition of a tracked index: display name, URL slug, and the
/// path of its public holdings page.
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub slug: &'static str,
    pub path: &'static str,
}

impl IndexSpec {
    /// Absolute URL of the holdings page
    pub fn url(&self, base: &str) -> String {
        format!("{}{}", base, self.path)
    }
}

/// A market index row as staged/persisted for one refresh cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub name: String,
    pub slug: String,
    pub url: String,
    pub refreshed_at: DateTime<Utc>,
}

impl IndexRecord {
    pub fn from_spec(spec: &IndexSpec, base: &str, refreshed_at: DateTime<Utc>) -> Self {
        Self {
            name: spec.name.to_string(),
            slug: spec.slug.to_string(),
            url: spec.url(base),
            refreshed_at,
        }
    }
}

/// One holdings-table row as scraped from an index page.
///
/// An empty ticker cell is recorded with the `"N/A"` sentinel instead of
/// being dropped, so the index weight accounting stays complete. A weight
/// cell that is missing or fails to parse becomes `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedHolding {
    pub rank: Option<u32>,
    pub ticker: String,
    /// Weight as percent of the index, `%` sign stripped
    pub weight: Option<f64>,
}
