//! Table statistics and selectivity estimation.

mod histogram;
mod table_stats;

pub use histogram::{IntHistogram, StringHistogram, NUM_HIST_BINS};
pub use table_stats::TableStats;
