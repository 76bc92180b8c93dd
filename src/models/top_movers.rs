use serde::{Deserialize, Serialize};
use std::fmt;

/// Ranking category within one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoverCategory {
    Gainers,
    Losers,
    MostTraded,
}

impl MoverCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoverCategory::Gainers => "gainers",
            MoverCategory::Losers => "losers",
            MoverCategory::MostTraded => "most_traded",
        }
    }

    pub fn all() -> [MoverCategory; 3] {
        [
            MoverCategory::Gainers,
            MoverCategory::Losers,
            MoverCategory::MostTraded,
        ]
    }
}

impl fmt::Display for MoverCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ranked entry in a top-movers list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoverRow {
    pub ticker: String,
    pub name: String,
    pub day_close: f64,
    pub todays_change: f64,
    pub todays_change_perc: f64,
    pub volume: u64,
}

/// Gainers / losers / most-traded rankings for one scope (the overall
/// market or a single index)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeMovers {
    pub slug: String,
    pub name: String,
    pub gainers: Vec<MoverRow>,
    pub losers: Vec<MoverRow>,
    pub most_traded: Vec<MoverRow>,
}

impl ScopeMovers {
    pub fn rows(&self, category: MoverCategory) -> &[MoverRow] {
        match category {
            MoverCategory::Gainers => &self.gainers,
            MoverCategory::Losers => &self.losers,
            MoverCategory::MostTraded => &self.most_traded,
        }
    }
}
