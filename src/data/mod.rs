//! Historical data module
//!
//! Historical bar sources for the playback engine, Parquet storage and
//! synthetic history generation

mod history;
mod parquet;
mod synthetic;

pub use history::{HistoricalBars, HistoricalSource, InMemoryHistory};
pub use parquet::{
    bar_file_name, bar_schema, parse_bar_file_name, BarParquetReader, BarParquetWriter,
    ParquetHistory,
};
pub use synthetic::{synthetic_bars, SyntheticSpec};
