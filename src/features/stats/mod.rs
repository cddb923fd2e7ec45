pub mod aggregator;
pub mod handler;
pub mod models;

pub use aggregator::DayAggregator;
pub use handler::create_stats_router;
pub use models::{CustomerDayStatistics, DaySummary};
