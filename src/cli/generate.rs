//! Generate command implementation

use super::parse_time;
use crate::bar::TimeFrame;
use crate::data::{synthetic_bars, BarParquetWriter, SyntheticSpec};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Symbol code
    #[arg(long, default_value = "EURUSD")]
    pub symbol: String,

    /// First bar time (RFC 3339)
    #[arg(long, default_value = "2024-01-01T00:00:00Z")]
    pub start: String,

    /// Number of days of minute bars
    #[arg(long, default_value = "7")]
    pub days: u32,

    /// Random walk seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Output directory
    #[arg(short, long, default_value = "./data")]
    pub output: PathBuf,
}

impl GenerateArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let start = parse_time(&self.start)?;
        let count = self.days as usize * 24 * 60;
        let spec = SyntheticSpec::minutes(start, count).with_seed(self.seed);
        let bars = synthetic_bars(&spec);

        let writer = BarParquetWriter::new(&self.output);
        let path = writer.write_bars(&self.symbol, TimeFrame::M1, &bars)?;
        tracing::info!(path = ?path, bars = bars.len(), "Generated synthetic history");
        Ok(())
    }
}
