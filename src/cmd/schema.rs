//! Schema command - print expected input formats

use crate::operations::{SimulationLine, CSV_COLUMNS};
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema or csv-header
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for one simulation line
    JsonSchema,
    /// CSV header row with column names
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => {
                let schema = schema_for!(SimulationLine);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::CsvHeader => println!("{}", CSV_COLUMNS.join(",")),
            SchemaFormat::CsvFields => print_csv_fields(),
        }
        Ok(())
    }
}

fn print_csv_fields() {
    println!("CSV Input Format");
    println!("================");
    println!();
    for (name, required, description) in CSV_FIELD_DESCRIPTIONS {
        let req = if *required { "required" } else { "optional" };
        println!("{:12} ({:8})  {}", name, req, description);
    }
    println!();
    println!("Rows sharing a simulation id form one simulation, processed in file order");
}

const CSV_FIELD_DESCRIPTIONS: &[(&str, bool, &str)] = &[
    ("simulation", true, "Simulation id; rows with the same id share a position"),
    ("operation", true, "buy or sell"),
    ("unit-cost", true, "Price per share (non-negative)"),
    ("quantity", true, "Number of shares (positive)"),
    ("ticker", false, "Ticker symbol, used with --ticker"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_descriptions_cover_every_column() {
        let names: Vec<&str> = CSV_FIELD_DESCRIPTIONS.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(names, CSV_COLUMNS);
    }

    #[test]
    fn json_schema_describes_operation_fields() {
        let schema = serde_json::to_string(&schema_for!(SimulationLine)).unwrap();
        assert!(schema.contains("unit-cost"));
        assert!(schema.contains("quantity"));
        assert!(schema.contains("\"buy\""));
        assert!(schema.contains("\"sell\""));
    }
}
