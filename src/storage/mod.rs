//! Columnar storage: bronze-layer raw partitions and per-season files.
//!
//! All reads and writes go through [`table::Table`], an in-memory column
//! table convertible to and from arrow record batches. The parquet layer
//! adds content-hash dedup, diff-by-key incremental merges, and atomic
//! writes with a compression fallback ladder.

pub mod parquet;
pub mod season;
pub mod table;

pub use parquet::{ParquetStorage, RawPayload, ReadMode, WriteOutcome};
pub use season::SeasonStore;
pub use table::{Column, ColumnData, Table};
