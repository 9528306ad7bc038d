pub mod calc;
pub mod report;
pub mod schema;
pub mod validate;

use crate::operations::{self, InputFormat, SimulationInput, StreamError};
use crate::tax::TaxPolicy;
use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Where simulations are read from
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Input file, one simulation per line. Reads from stdin if not specified.
    #[arg(default_value = "-")]
    pub file: PathBuf,

    /// Input format (defaults to csv for .csv files, json otherwise)
    #[arg(short, long, value_enum)]
    pub format: Option<InputFormat>,

    /// Only process operations for this ticker
    #[arg(long)]
    pub ticker: Option<String>,
}

impl InputArgs {
    pub fn input_format(&self) -> InputFormat {
        self.format.unwrap_or_else(|| {
            let is_csv = self
                .file
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_csv {
                InputFormat::Csv
            } else {
                InputFormat::Json
            }
        })
    }

    /// Stream simulations, applying the ticker filter
    pub fn read<'a>(
        &'a self,
        buffer_size: usize,
    ) -> anyhow::Result<impl Iterator<Item = Result<SimulationInput, StreamError>> + 'a> {
        let reader = open_input(&self.file, buffer_size)?;
        let ticker = self.ticker.as_deref();
        Ok(operations::read_simulations(reader, self.input_format())
            .map(move |sim| sim.map(|s| s.filter_ticker(ticker))))
    }
}

/// Overrides for the exemption threshold and tax rate
#[derive(Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// Sale value at or below which sales are tax exempt [default: 20000]
    #[arg(long)]
    pub threshold: Option<Decimal>,

    /// Tax rate applied to taxable gains, e.g. 0.20 [default: 0.20]
    #[arg(long)]
    pub tax_rate: Option<Decimal>,
}

impl PolicyArgs {
    pub fn policy(&self) -> anyhow::Result<TaxPolicy> {
        let policy = TaxPolicy::with_overrides(self.threshold, self.tax_rate)?;
        log::debug!(
            "Tax policy: threshold={}, rate={}",
            policy.exemption_threshold(),
            policy.tax_rate()
        );
        Ok(policy)
    }
}

/// Open a file (or stdin with "-") for buffered reading
fn open_input(path: &Path, buffer_size: usize) -> anyhow::Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(BufReader::with_capacity(buffer_size, io::stdin())))
    } else {
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file {}", path.display()))?;
        Ok(Box::new(BufReader::with_capacity(buffer_size, file)))
    }
}

/// Default I/O buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;
