mod chart;
mod index;
mod stock;
mod top_movers;
pub mod indicators;

pub use chart::{ChartBar, ChartBarSet, ChartRange, RawBar, Timespan};
pub use index::{IndexRecord, IndexSpec, ScrapedHolding};
pub use stock::{StockMasterRecord, StockRecord};
pub use top_movers::{MoverCategory, MoverRow, ScopeMovers};

use std::collections::HashMap;

/// Bulk snapshot output: ticker -> validated master record
pub type MasterMap = HashMap<String, StockMasterRecord>;
