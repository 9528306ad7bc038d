//! Calc command - tax per operation, one JSON line per simulation

use crate::cmd::{InputArgs, PolicyArgs, DEFAULT_BUFFER_SIZE};
use crate::tax::{calculate_taxes, TaxPolicy};
use crate::utils::parse_buffer_size;
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::time::Instant;

#[derive(Args, Debug)]
pub struct CalcCommand {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    policy: PolicyArgs,

    /// Flush output after every simulation
    #[arg(long)]
    print_every_line: bool,

    /// Print total processing time to stderr when done
    #[arg(short, long)]
    timings: bool,

    /// Input buffer size, e.g. 64k, 8m
    #[arg(long, value_parser = parse_buffer_size)]
    buffer_in: Option<usize>,

    /// Output buffer size, e.g. 64k, 8m
    #[arg(long, value_parser = parse_buffer_size)]
    buffer_out: Option<usize>,

    /// Report a failing simulation as an error line and carry on with the next
    #[arg(long)]
    continue_on_error: bool,
}

#[derive(Debug, Serialize)]
struct ErrorLine {
    error: String,
}

impl CalcCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let start = Instant::now();
        let policy = self.policy.policy()?;
        let stdout = io::stdout();
        let mut out = BufWriter::with_capacity(self.output_buffer_size(), stdout.lock());

        let count = self.run(policy, &mut out)?;
        out.flush()?;

        log::info!("Processed {} simulations", count);
        if self.timings {
            eprintln!("Total time taken: {}ms", start.elapsed().as_millis());
        }
        Ok(())
    }

    fn output_buffer_size(&self) -> usize {
        if self.print_every_line {
            DEFAULT_BUFFER_SIZE
        } else {
            self.buffer_out.unwrap_or(DEFAULT_BUFFER_SIZE)
        }
    }

    /// Process every simulation, writing one line each; returns the simulation count
    fn run<W: Write>(&self, policy: TaxPolicy, out: &mut W) -> anyhow::Result<usize> {
        let buffer_in = self.buffer_in.unwrap_or(DEFAULT_BUFFER_SIZE);
        let mut count = 0;

        for simulation in self.input.read(buffer_in)? {
            count += 1;
            let outcome = simulation.map_err(anyhow::Error::from).and_then(|sim| {
                calculate_taxes(&sim.operations, policy)
                    .with_context(|| format!("simulation {}", sim.number))
            });

            match outcome {
                Ok(results) => serde_json::to_writer(&mut *out, &results)?,
                Err(e) if self.continue_on_error => {
                    log::error!("{:#}", e);
                    let line = ErrorLine {
                        error: format!("{:#}", e),
                    };
                    serde_json::to_writer(&mut *out, &line)?;
                }
                Err(e) => {
                    out.flush()?;
                    return Err(e);
                }
            }
            writeln!(out)?;
            if self.print_every_line {
                out.flush()?;
            }
        }

        Ok(count)
    }
}
