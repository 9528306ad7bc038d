//! Validate command - surface input problems without computing output

use crate::cmd::{InputArgs, PolicyArgs, DEFAULT_BUFFER_SIZE};
use crate::operations::{SimulationInput, StreamError};
use crate::tax::{calculate_taxes, EngineError, TaxPolicy};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    policy: PolicyArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation: Option<usize>,
    message: String,
}

impl ValidationIssue {
    fn from_stream(err: &StreamError) -> Self {
        ValidationIssue {
            issue_type: "Decode".to_string(),
            simulation: err.simulation(),
            operation: None,
            message: err.to_string(),
        }
    }

    fn from_engine(simulation: usize, err: &EngineError) -> Self {
        let issue_type = if err.is_validation() {
            "Validation"
        } else {
            "Precision"
        };
        ValidationIssue {
            issue_type: issue_type.to_string(),
            simulation: Some(simulation),
            operation: Some(err.index + 1),
            message: err.error.to_string(),
        }
    }
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    simulation_count: usize,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let policy = self.policy.policy()?;
        let mut simulation_count = 0;
        let mut issues = Vec::new();

        for simulation in self.input.read(DEFAULT_BUFFER_SIZE)? {
            simulation_count += 1;
            issues.extend(check_simulation(simulation, policy));
        }

        if self.json {
            self.print_json(simulation_count, &issues)?;
        } else {
            self.print_text(simulation_count, &issues);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }

    fn print_text(&self, simulation_count: usize, issues: &[ValidationIssue]) {
        println!();
        println!("VALIDATION RESULTS ({} simulations)", simulation_count);
        println!();

        if issues.is_empty() {
            println!("\u{2713} No issues found.");
            return;
        }

        println!("\u{26A0} {} issue(s) found:", issues.len());
        println!();
        for (i, issue) in issues.iter().enumerate() {
            let location = match (issue.simulation, issue.operation) {
                (Some(s), Some(o)) => format!("simulation {}, operation {}", s, o),
                (Some(s), None) => format!("simulation {}", s),
                _ => "input".to_string(),
            };
            println!("  {}. [{}] {}", i + 1, issue.issue_type, location);
            println!("     {}", issue.message);
            println!();
        }
    }

    fn print_json(&self, simulation_count: usize, issues: &[ValidationIssue]) -> anyhow::Result<()> {
        let output = ValidationOutput {
            simulation_count,
            issue_count: issues.len(),
            issues: issues.to_vec(),
        };

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

fn check_simulation(
    simulation: Result<SimulationInput, StreamError>,
    policy: TaxPolicy,
) -> Option<ValidationIssue> {
    match simulation {
        Err(e) => Some(ValidationIssue::from_stream(&e)),
        Ok(sim) => calculate_taxes(&sim.operations, policy)
            .err()
            .map(|e| ValidationIssue::from_engine(sim.number, &e)),
    }
}
