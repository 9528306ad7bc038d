use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, Read};

/// Type of stock operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Buy,
    Sell,
}

impl OperationKind {
    pub fn display(&self) -> &'static str {
        match self {
            OperationKind::Buy => "buy",
            OperationKind::Sell => "sell",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// A single buy or sell, as read from one simulation line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct Operation {
    /// Either "buy" or "sell"
    #[serde(rename = "operation")]
    pub kind: OperationKind,
    /// Price paid or received per share
    #[serde(rename = "unit-cost", with = "rust_decimal::serde::arbitrary_precision")]
    #[schemars(with = "f64")]
    pub unit_cost: Decimal,
    /// Number of shares bought or sold
    pub quantity: i64,
    /// Optional ticker symbol, only used for filtering
    #[serde(default)]
    pub ticker: Option<String>,
}

#[cfg(test)]
impl Operation {
    pub fn buy(unit_cost: Decimal, quantity: i64) -> Self {
        Operation {
            kind: OperationKind::Buy,
            unit_cost,
            quantity,
            ticker: None,
        }
    }

    pub fn sell(unit_cost: Decimal, quantity: i64) -> Self {
        Operation {
            kind: OperationKind::Sell,
            unit_cost,
            quantity,
            ticker: None,
        }
    }
}

impl Operation {
    /// Whether this operation belongs to the given ticker (case-insensitive)
    pub fn matches_ticker(&self, ticker: &str) -> bool {
        self.ticker
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(ticker))
    }
}

/// One simulation line: an ordered list of operations sharing a position
pub type SimulationLine = Vec<Operation>;

/// Operations for one independent simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationInput {
    /// 1-based position of the simulation in the input
    pub number: usize,
    pub operations: Vec<Operation>,
}

impl SimulationInput {
    /// Keep only operations for the given ticker, if any
    pub fn filter_ticker(mut self, ticker: Option<&str>) -> Self {
        if let Some(ticker) = ticker {
            self.operations.retain(|op| op.matches_ticker(ticker));
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("simulation {simulation}: invalid operations: {error}")]
    Json {
        simulation: usize,
        error: serde_json::Error,
    },
    #[error("invalid CSV record: {0}")]
    Csv(#[from] csv::Error),
}

impl StreamError {
    /// Simulation the error belongs to, when known
    pub fn simulation(&self) -> Option<usize> {
        match self {
            StreamError::Json { simulation, .. } => Some(*simulation),
            StreamError::Io(_) | StreamError::Csv(_) => None,
        }
    }
}

/// Supported input encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputFormat {
    /// One JSON array of operations per line
    #[default]
    Json,
    /// CSV rows tagged with a simulation id
    Csv,
}

/// Read simulations in the given format
pub fn read_simulations<'a, R: BufRead + 'a>(
    reader: R,
    format: InputFormat,
) -> Box<dyn Iterator<Item = Result<SimulationInput, StreamError>> + 'a> {
    match format {
        InputFormat::Json => Box::new(JsonLines::new(reader)),
        InputFormat::Csv => match read_csv_simulations(reader) {
            Ok(simulations) => Box::new(simulations.into_iter().map(Ok)),
            Err(e) => Box::new(std::iter::once(Err(e))),
        },
    }
}

/// Streams simulations from JSON lines, stopping at end of input or the first blank line
pub struct JsonLines<R> {
    lines: std::io::Lines<R>,
    number: usize,
    done: bool,
}

impl<R: BufRead> JsonLines<R> {
    pub fn new(reader: R) -> Self {
        JsonLines {
            lines: reader.lines(),
            number: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = Result<SimulationInput, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let line = match self.lines.next() {
            None => {
                self.done = true;
                return None;
            }
            Some(Err(e)) => {
                self.done = true;
                return Some(Err(e.into()));
            }
            Some(Ok(line)) => line,
        };
        if line.trim().is_empty() {
            self.done = true;
            return None;
        }

        self.number += 1;
        let simulation = self.number;
        Some(
            serde_json::from_str::<SimulationLine>(&line)
                .map(|operations| SimulationInput {
                    number: simulation,
                    operations,
                })
                .map_err(|error| StreamError::Json { simulation, error }),
        )
    }
}

/// CSV input row
#[derive(Debug, Deserialize)]
struct CsvOperationRecord {
    simulation: String,
    operation: OperationKind,
    #[serde(rename = "unit-cost", with = "rust_decimal::serde::str")]
    unit_cost: Decimal,
    quantity: i64,
    #[serde(default)]
    ticker: Option<String>,
}

/// CSV header columns, in order
pub const CSV_COLUMNS: &[&str] = &["simulation", "operation", "unit-cost", "quantity", "ticker"];

/// Read CSV rows and group them into simulations by id, in order of first appearance
pub fn read_csv_simulations<R: Read>(reader: R) -> Result<Vec<SimulationInput>, StreamError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut simulations: Vec<SimulationInput> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for result in rdr.deserialize() {
        let record: CsvOperationRecord = result?;
        let idx = *by_id.entry(record.simulation).or_insert_with(|| {
            simulations.push(SimulationInput {
                number: simulations.len() + 1,
                operations: Vec::new(),
            });
            simulations.len() - 1
        });
        simulations[idx].operations.push(Operation {
            kind: record.operation,
            unit_cost: record.unit_cost,
            quantity: record.quantity,
            ticker: record.ticker.filter(|t| !t.is_empty()),
        });
    }

    log::info!("Read {} simulations from CSV", simulations.len());
    Ok(simulations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    #[test]
    fn parse_json_line() {
        let input = r#"[{"operation":"buy", "unit-cost":10.00, "quantity": 10000},{"operation":"sell", "unit-cost":20.50, "quantity": 5000, "ticker": "NU"}]"#;
        let simulations: Vec<_> = JsonLines::new(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(simulations.len(), 1);
        let ops = &simulations[0].operations;
        assert_eq!(simulations[0].number, 1);
        assert_eq!(ops[0], Operation::buy(dec!(10.00), 10000));
        assert_eq!(ops[1].kind, OperationKind::Sell);
        assert_eq!(ops[1].unit_cost, dec!(20.50));
        assert_eq!(ops[1].quantity, 5000);
        assert_eq!(ops[1].ticker.as_deref(), Some("NU"));
    }

    #[test]
    fn unit_cost_keeps_exact_decimal() {
        let input = r#"[{"operation":"buy", "unit-cost":0.1, "quantity": 3}]"#;
        let simulations: Vec<_> = JsonLines::new(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(simulations[0].operations[0].unit_cost, dec!(0.1));
    }

    #[test]
    fn stops_at_first_blank_line() {
        let input = "[{\"operation\":\"buy\", \"unit-cost\":10, \"quantity\": 1}]\n\
                     [{\"operation\":\"buy\", \"unit-cost\":20, \"quantity\": 2}]\n\
                     \n\
                     [{\"operation\":\"buy\", \"unit-cost\":30, \"quantity\": 3}]\n";
        let simulations: Vec<_> = JsonLines::new(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(simulations.len(), 2);
        assert_eq!(simulations[1].number, 2);
        assert_eq!(simulations[1].operations[0].unit_cost, dec!(20));
    }

    #[test]
    fn unknown_operation_is_a_decode_error() {
        let input = "[{\"operation\":\"buy\", \"unit-cost\":10, \"quantity\": 1}]\n\
                     [{\"operation\":\"short_sell\", \"unit-cost\":15, \"quantity\": 50}]\n";
        let results: Vec<_> = JsonLines::new(Cursor::new(input)).collect();
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.simulation(), Some(2));
        assert!(err.to_string().contains("short_sell"));
    }

    #[test]
    fn negative_quantity_decodes_for_later_validation() {
        let input = r#"[{"operation":"buy", "unit-cost":20.00, "quantity": -1}]"#;
        let simulations: Vec<_> = JsonLines::new(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(simulations[0].operations[0].quantity, -1);
    }

    #[test]
    fn csv_rows_grouped_by_simulation() {
        let input = "\
simulation,operation,unit-cost,quantity,ticker
a,buy,10.00,100,NU
b,buy,10.00,10000,
a,sell,15.00,50,NU
b,sell,20.00,5000,
";
        let simulations = read_csv_simulations(Cursor::new(input)).unwrap();
        assert_eq!(simulations.len(), 2);
        assert_eq!(simulations[0].number, 1);
        assert_eq!(
            simulations[0].operations.iter().map(|op| op.kind).collect::<Vec<_>>(),
            vec![OperationKind::Buy, OperationKind::Sell]
        );
        assert_eq!(simulations[0].operations[1].unit_cost, dec!(15.00));
        assert_eq!(simulations[0].operations[0].ticker.as_deref(), Some("NU"));
        assert_eq!(simulations[1].operations[1].quantity, 5000);
        assert_eq!(simulations[1].operations[1].ticker, None);
    }

    #[test]
    fn filter_by_ticker() {
        let mut other = Operation::buy(dec!(5), 10);
        other.ticker = Some("XP".to_string());
        let mut nu = Operation::buy(dec!(10), 100);
        nu.ticker = Some("NU".to_string());

        let input = SimulationInput {
            number: 1,
            operations: vec![other.clone(), nu.clone(), Operation::sell(dec!(1), 1)],
        };
        assert_eq!(input.clone().filter_ticker(None).operations.len(), 3);
        assert_eq!(input.filter_ticker(Some("nu")).operations, vec![nu]);
    }
}
