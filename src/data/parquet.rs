//! Parquet storage for historical bars
//!
//! One file per (symbol, timeframe), named `<SYMBOL>_<timeframe>.parquet`.

use super::history::{HistoricalBars, InMemoryHistory};
use crate::bar::{TimeFrame, TimedBar};
use arrow::array::{Array, ArrayRef, Float64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Bar schema: UTC open time plus OHLCV as f64
pub fn bar_schema() -> Schema {
    let mut fields = vec![Field::new(
        "open_time",
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )];
    fields.extend(
        PRICE_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, false)),
    );
    Schema::new(fields)
}

/// File name for a (symbol, timeframe) history file
pub fn bar_file_name(symbol: &str, timeframe: TimeFrame) -> String {
    format!("{}_{}.parquet", symbol, timeframe)
}

/// Split a history file name back into (symbol, timeframe)
pub fn parse_bar_file_name(file_name: &str) -> Option<(String, TimeFrame)> {
    let stem = file_name.strip_suffix(".parquet")?;
    let (symbol, timeframe) = stem.rsplit_once('_')?;
    if symbol.is_empty() {
        return None;
    }
    Some((symbol.to_string(), timeframe.parse().ok()?))
}

/// Writes bar history files
pub struct BarParquetWriter {
    output_dir: PathBuf,
}

impl BarParquetWriter {
    /// Create a writer for a directory
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Path of the file for (symbol, timeframe)
    pub fn file_path(&self, symbol: &str, timeframe: TimeFrame) -> PathBuf {
        self.output_dir.join(bar_file_name(symbol, timeframe))
    }

    /// Write bars for (symbol, timeframe), replacing any existing file
    pub fn write_bars(
        &self,
        symbol: &str,
        timeframe: TimeFrame,
        bars: &[TimedBar],
    ) -> anyhow::Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.file_path(symbol, timeframe);

        let schema = Arc::new(bar_schema());
        let file = File::create(&path)?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        let open_times: Vec<i64> = bars
            .iter()
            .map(|b| b.open_time.timestamp_micros())
            .collect();
        let mut columns: Vec<ArrayRef> =
            vec![Arc::new(TimestampMicrosecondArray::from(open_times).with_timezone("UTC"))];
        let fields: [fn(&TimedBar) -> f64; 5] = [
            |b| b.open,
            |b| b.high,
            |b| b.low,
            |b| b.close,
            |b| b.volume,
        ];
        for field in fields {
            let values: Vec<f64> = bars.iter().map(field).collect();
            columns.push(Arc::new(Float64Array::from(values)));
        }

        let batch = RecordBatch::try_new(schema, columns)?;

        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = bars.len(), "Wrote bars to Parquet");

        Ok(path)
    }
}

/// Reads one bar history file
pub struct BarParquetReader {
    path: PathBuf,
}

impl BarParquetReader {
    /// Create a new reader for a Parquet file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read every bar in the file
    pub fn read_bars(&self) -> anyhow::Result<Vec<TimedBar>> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut bars = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;

            let open_times = batch
                .column_by_name("open_time")
                .and_then(|c| c.as_any().downcast_ref::<TimestampMicrosecondArray>())
                .ok_or_else(|| anyhow::anyhow!("Invalid open_time column"))?;

            let mut prices: Vec<&Float64Array> = Vec::with_capacity(PRICE_COLUMNS.len());
            for name in PRICE_COLUMNS {
                let column = batch
                    .column_by_name(name)
                    .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
                    .ok_or_else(|| anyhow::anyhow!("Invalid {} column", name))?;
                prices.push(column);
            }

            for i in 0..batch.num_rows() {
                let open_time = DateTime::from_timestamp_micros(open_times.value(i))
                    .ok_or_else(|| anyhow::anyhow!("Invalid open_time"))?;
                let value = |column: &Float64Array| {
                    if column.is_null(i) {
                        f64::NAN
                    } else {
                        column.value(i)
                    }
                };
                bars.push(TimedBar::new(
                    open_time,
                    value(prices[0]),
                    value(prices[1]),
                    value(prices[2]),
                    value(prices[3]),
                    value(prices[4]),
                ));
            }
        }

        Ok(bars)
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Loads every history file found in a directory
pub struct ParquetHistory;

impl ParquetHistory {
    /// Read all `<SYMBOL>_<timeframe>.parquet` files under `dir`.
    ///
    /// Files with other names are skipped.
    pub fn load_dir(dir: impl AsRef<Path>) -> anyhow::Result<InMemoryHistory> {
        let dir = dir.as_ref();
        let mut history = InMemoryHistory::new();

        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        for path in entries {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((symbol, timeframe)) = parse_bar_file_name(file_name) else {
                tracing::debug!(path = ?path, "Skipping non-history file");
                continue;
            };
            let bars = BarParquetReader::new(&path).read_bars()?;
            tracing::info!(
                symbol = %symbol,
                timeframe = %timeframe,
                count = bars.len(),
                "Loaded historical bars"
            );
            history.insert(HistoricalBars::new(symbol, timeframe, bars));
        }

        Ok(history)
    }
}
