//! WAX blockchain access: table reads and the WAX Labs queries built on them

pub mod chain;
pub mod queries;

pub use chain::{
    get_table_rows, ChainError, TableRow, TableRowsPage, TableRowsQuery, TableRowsSource,
    WaxChainClient,
};
pub use queries::{get_deliverables, get_profile, get_proposal};
