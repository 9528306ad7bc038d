use crate::operations::{Operation, OperationKind};
use crate::tax::policy::TaxPolicy;
use crate::tax::position::{Disposal, Position, PrecisionError};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Structural problems with an operation, detected before the position is touched
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unit cost must not be negative: {0}")]
    NegativePrice(Decimal),
    #[error("quantity must be positive: {0}")]
    NonPositiveQuantity(i64),
    #[error("insufficient shares available for sale: requested {requested}, available {available}")]
    InsufficientShares { requested: u64, available: u64 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OperationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Precision(#[from] PrecisionError),
}

/// Failure of an operation within a simulation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("operation {}: {error}", .index + 1)]
pub struct EngineError {
    /// 0-based index of the failing operation
    pub index: usize,
    pub error: OperationError,
}

impl EngineError {
    pub fn is_validation(&self) -> bool {
        matches!(self.error, OperationError::Validation(_))
    }
}

/// Tax due on a single operation, rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxResult {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub tax: Decimal,
}

impl TaxResult {
    pub fn zero() -> Self {
        TaxResult::from_unrounded(Decimal::ZERO)
    }

    /// Round half-up to 2 decimal places, always keeping two places for display
    pub fn from_unrounded(tax: Decimal) -> Self {
        let mut tax = tax.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        tax.rescale(2);
        TaxResult { tax }
    }
}

/// Detailed record of one processed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// 0-based index within the simulation
    pub index: usize,
    pub kind: OperationKind,
    pub unit_cost: Decimal,
    pub quantity: u64,
    /// Present for sells only
    pub disposal: Option<DisposalSummary>,
    pub tax: Decimal,
    pub position_after: Position,
}

impl LedgerEntry {
    pub fn result(&self) -> TaxResult {
        TaxResult { tax: self.tax }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisposalSummary {
    pub sale_value: Decimal,
    pub profit: Decimal,
    pub exempt: bool,
    pub loss_offset: Decimal,
    pub taxable: Decimal,
}

impl From<&Disposal> for DisposalSummary {
    fn from(d: &Disposal) -> Self {
        DisposalSummary {
            sale_value: d.sale_value,
            profit: d.profit,
            exempt: d.exempt,
            loss_offset: d.loss_offset,
            taxable: d.taxable,
        }
    }
}

/// A single simulation: owns a fresh position and processes operations in order
#[derive(Debug, Clone)]
pub struct Simulation {
    policy: TaxPolicy,
    position: Position,
    processed: usize,
}

impl Simulation {
    pub fn new(policy: TaxPolicy) -> Self {
        Simulation {
            policy,
            position: Position::new(),
            processed: 0,
        }
    }

    #[cfg(test)]
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Apply the next operation. A rejected operation leaves the position unchanged
    /// but still takes its place in the input order.
    pub fn process(&mut self, operation: &Operation) -> Result<LedgerEntry, EngineError> {
        let index = self.processed;
        self.processed += 1;
        self.apply(index, operation).map_err(|error| {
            log::warn!("Rejected operation {}: {}", index + 1, error);
            EngineError { index, error }
        })
    }

    fn apply(&mut self, index: usize, operation: &Operation) -> Result<LedgerEntry, OperationError> {
        let quantity = validate(operation, &self.position)?;

        let (disposal, tax) = match operation.kind {
            OperationKind::Buy => {
                self.position.acquire(quantity, operation.unit_cost)?;
                (None, TaxResult::zero())
            }
            OperationKind::Sell => {
                let disposal =
                    self.position
                        .dispose(quantity, operation.unit_cost, &self.policy)?;
                let tax = TaxResult::from_unrounded(disposal.tax);
                (Some(DisposalSummary::from(&disposal)), tax)
            }
        };

        Ok(LedgerEntry {
            index,
            kind: operation.kind,
            unit_cost: operation.unit_cost,
            quantity,
            disposal,
            tax: tax.tax,
            position_after: self.position.clone(),
        })
    }
}

/// Check structural preconditions, returning the quantity as an unsigned count
fn validate(operation: &Operation, position: &Position) -> Result<u64, ValidationError> {
    if operation.unit_cost < Decimal::ZERO {
        return Err(ValidationError::NegativePrice(operation.unit_cost));
    }
    let quantity = u64::try_from(operation.quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or(ValidationError::NonPositiveQuantity(operation.quantity))?;
    if operation.kind == OperationKind::Sell && quantity > position.quantity_held() {
        return Err(ValidationError::InsufficientShares {
            requested: quantity,
            available: position.quantity_held(),
        });
    }
    Ok(quantity)
}

/// Process a whole simulation from a fresh position, halting at the first error
pub fn calculate_ledger(
    operations: &[Operation],
    policy: TaxPolicy,
) -> Result<Vec<LedgerEntry>, EngineError> {
    let mut simulation = Simulation::new(policy);
    operations.iter().map(|op| simulation.process(op)).collect()
}

/// Tax due for each operation of a simulation, in input order
pub fn calculate_taxes(
    operations: &[Operation],
    policy: TaxPolicy,
) -> Result<Vec<TaxResult>, EngineError> {
    Ok(calculate_ledger(operations, policy)?
        .iter()
        .map(LedgerEntry::result)
        .collect())
}
