pub mod journal;

// Re-export commonly used items
pub use crate::journal::{
    merge_trades_with_deduplication, read_journal, sort_trades_by_exit_date, write_journal,
    MergeStats,
};
