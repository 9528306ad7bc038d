//! Report command - per-operation ledger with position after each step

use crate::cmd::{InputArgs, PolicyArgs, DEFAULT_BUFFER_SIZE};
use crate::operations::{SimulationInput, StreamError};
use crate::tax::{EngineError, LedgerEntry, Simulation, TaxPolicy};
use crate::utils::{format_decimal, format_money, write_csv};
use clap::Args;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    policy: PolicyArgs,

    /// Only report this simulation (1-based)
    #[arg(short, long)]
    simulation: Option<usize>,

    /// Output as CSV instead of formatted table
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

/// Ledger for one simulation, cut short at the first rejected operation
#[derive(Debug, Serialize)]
struct SimulationReport {
    simulation: usize,
    entries: Vec<LedgerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SimulationReport {
    fn build(input: &SimulationInput, policy: TaxPolicy) -> Self {
        let mut simulation = Simulation::new(policy);
        let mut entries = Vec::with_capacity(input.operations.len());
        let mut error: Option<EngineError> = None;

        for op in &input.operations {
            match simulation.process(op) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }

        SimulationReport {
            simulation: input.number,
            entries,
            error: error.map(|e| e.to_string()),
        }
    }

    fn failed(simulation: usize, error: &StreamError) -> Self {
        SimulationReport {
            simulation,
            entries: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    fn total_tax(&self) -> rust_decimal::Decimal {
        self.entries.iter().map(|e| e.tax).sum()
    }
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct LedgerRow {
    #[tabled(rename = "Sim")]
    simulation: usize,
    #[tabled(rename = "#")]
    operation: usize,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Unit Cost")]
    unit_cost: String,
    #[tabled(rename = "Quantity")]
    quantity: u64,
    #[tabled(rename = "Sale Value")]
    sale_value: String,
    #[tabled(rename = "Profit")]
    profit: String,
    #[tabled(rename = "Loss Offset")]
    loss_offset: String,
    #[tabled(rename = "Tax")]
    tax: String,
    #[tabled(rename = "Held")]
    quantity_held: u64,
    #[tabled(rename = "Avg Cost")]
    average_cost: String,
    #[tabled(rename = "Carried Loss")]
    accumulated_loss: String,
}

impl LedgerRow {
    fn new(simulation: usize, entry: &LedgerEntry) -> Self {
        let disposal = entry.disposal.as_ref();
        let position = &entry.position_after;
        LedgerRow {
            simulation,
            operation: entry.index + 1,
            kind: entry.kind.to_string(),
            unit_cost: format_money(entry.unit_cost),
            quantity: entry.quantity,
            sale_value: disposal
                .map(|d| {
                    let value = format_money(d.sale_value);
                    if d.exempt {
                        format!("{} (exempt)", value)
                    } else {
                        value
                    }
                })
                .unwrap_or_default(),
            profit: disposal.map(|d| format_money(d.profit)).unwrap_or_default(),
            loss_offset: disposal
                .map(|d| format_money(d.loss_offset))
                .unwrap_or_default(),
            tax: format_money(entry.tax),
            quantity_held: position.quantity_held(),
            average_cost: format_decimal(position.weighted_average_cost()),
            accumulated_loss: format_money(position.accumulated_loss()),
        }
    }
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let policy = self.policy.policy()?;
        let mut reports = Vec::new();

        for simulation in self.input.read(DEFAULT_BUFFER_SIZE)? {
            let report = match simulation {
                Ok(simulation) => {
                    if !self.selects(simulation.number) {
                        continue;
                    }
                    SimulationReport::build(&simulation, policy)
                }
                // Decode errors tied to a simulation are reported inline like engine errors
                Err(e) => match e.simulation() {
                    Some(number) if !self.selects(number) => continue,
                    Some(number) => SimulationReport::failed(number, &e),
                    None => return Err(e.into()),
                },
            };
            reports.push(report);
        }

        if let Some(n) = self.simulation {
            if reports.is_empty() {
                anyhow::bail!("Simulation {} not found in input", n);
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else if self.csv {
            let rows = reports
                .iter()
                .flat_map(|r| r.entries.iter().map(move |e| LedgerRow::new(r.simulation, e)));
            write_csv(rows, io::stdout())?;
        } else {
            self.print_tables(&reports);
        }

        let failed = reports.iter().filter(|r| r.error.is_some()).count();
        if failed > 0 {
            anyhow::bail!("{} simulation(s) stopped at an invalid operation", failed);
        }
        Ok(())
    }

    fn selects(&self, number: usize) -> bool {
        self.simulation.map_or(true, |n| n == number)
    }

    fn print_tables(&self, reports: &[SimulationReport]) {
        if reports.is_empty() {
            println!("No simulations found");
            return;
        }

        for report in reports {
            println!();
            println!("SIMULATION {}", report.simulation);
            println!();

            if report.entries.is_empty() {
                println!("  (no operations)");
            } else {
                let rows: Vec<LedgerRow> = report
                    .entries
                    .iter()
                    .map(|e| LedgerRow::new(report.simulation, e))
                    .collect();
                let table = Table::new(rows)
                    .with(Style::rounded())
                    .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
                    .to_string();
                println!("{}", table);
            }

            println!("Total tax: {}", format_money(report.total_tax()));
            if let Some(error) = &report.error {
                println!("\u{26A0} Stopped: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::Operation;
    use rust_decimal_macros::dec;

    #[test]
    fn report_stops_at_rejected_operation() {
        let input = SimulationInput {
            number: 2,
            operations: vec![
                Operation::buy(dec!(10), 100),
                Operation::sell(dec!(15), 150),
                Operation::sell(dec!(15), 50),
            ],
        };
        let report = SimulationReport::build(&input, TaxPolicy::default());
        assert_eq!(report.simulation, 2);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(
            report.error.as_deref(),
            Some("operation 2: insufficient shares available for sale: requested 150, available 100")
        );
    }

    #[test]
    fn ledger_row_rounds_unrounded_values() {
        let input = SimulationInput {
            number: 1,
            operations: vec![
                Operation::buy(dec!(10), 10000),
                Operation::buy(dec!(1), 500),
                Operation::sell(dec!(20), 5000),
            ],
        };
        let report = SimulationReport::build(&input, TaxPolicy::default());
        let row = LedgerRow::new(1, &report.entries[2]);
        assert_eq!(row.profit, "52142.86");
        assert_eq!(row.tax, "10428.57");
        assert_eq!(row.average_cost, "9.57142857");
        assert_eq!(report.total_tax(), dec!(10428.57));
    }
}
