use crate::tax::policy::TaxPolicy;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PrecisionError {
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
    #[error("arithmetic underflow computing {0}")]
    Underflow(&'static str),
}

/// Outcome of a single disposal before the tax is rounded for output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposal {
    pub sale_value: Decimal,
    pub profit: Decimal,
    pub exempt: bool,
    pub loss_offset: Decimal,
    pub taxable: Decimal,
    pub tax: Decimal,
}

/// Weighted average cost position for a single simulation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    quantity_held: u64,
    weighted_average_cost: Decimal,
    accumulated_loss: Decimal,
}

impl Position {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quantity_held(&self) -> u64 {
        self.quantity_held
    }

    pub fn weighted_average_cost(&self) -> Decimal {
        self.weighted_average_cost
    }

    pub fn accumulated_loss(&self) -> Decimal {
        self.accumulated_loss
    }

    /// Add shares to the position, folding their cost into the running average.
    ///
    /// `avg + (price - avg) * qty / (held + qty)` is the same weighted average as
    /// `(avg * held + price * qty) / (held + qty)`, but leaves the average untouched
    /// when buying at exactly the current average.
    pub fn acquire(&mut self, quantity: u64, unit_cost: Decimal) -> Result<(), PrecisionError> {
        let held = self
            .quantity_held
            .checked_add(quantity)
            .ok_or(PrecisionError::Overflow("quantity held"))?;
        let adjustment = unit_cost
            .checked_sub(self.weighted_average_cost)
            .and_then(|delta| delta.checked_mul(Decimal::from(quantity)))
            .and_then(|weighted| weighted.checked_div(Decimal::from(held)))
            .ok_or(PrecisionError::Overflow("average cost"))?;
        let average = self
            .weighted_average_cost
            .checked_add(adjustment)
            .ok_or(PrecisionError::Overflow("average cost"))?;

        log::debug!(
            "BUY: qty={}, unit_cost={}. Position: qty={} -> {}, avg={} -> {}",
            quantity,
            unit_cost,
            self.quantity_held,
            held,
            self.weighted_average_cost,
            average
        );

        self.quantity_held = held;
        self.weighted_average_cost = average;
        Ok(())
    }

    /// Remove shares from the position and work out the tax due on the sale.
    ///
    /// The caller must already have checked that `quantity` does not exceed the
    /// holdings. Nothing is modified unless every step succeeds.
    pub fn dispose(
        &mut self,
        quantity: u64,
        unit_cost: Decimal,
        policy: &TaxPolicy,
    ) -> Result<Disposal, PrecisionError> {
        let remaining = self
            .quantity_held
            .checked_sub(quantity)
            .ok_or(PrecisionError::Underflow("quantity held"))?;
        let qty = Decimal::from(quantity);
        let sale_value = unit_cost
            .checked_mul(qty)
            .ok_or(PrecisionError::Overflow("sale value"))?;
        let profit = unit_cost
            .checked_sub(self.weighted_average_cost)
            .and_then(|margin| margin.checked_mul(qty))
            .ok_or(PrecisionError::Overflow("profit"))?;
        let exempt = policy.is_exempt(sale_value);

        let (loss_offset, taxable, accumulated_loss) = if profit < Decimal::ZERO {
            // Losses are carried forward even when the sale itself is exempt
            let loss = self
                .accumulated_loss
                .checked_add(-profit)
                .ok_or(PrecisionError::Overflow("accumulated loss"))?;
            (Decimal::ZERO, Decimal::ZERO, loss)
        } else if exempt {
            (Decimal::ZERO, Decimal::ZERO, self.accumulated_loss)
        } else {
            let offset = profit.min(self.accumulated_loss);
            (offset, profit - offset, self.accumulated_loss - offset)
        };

        let tax = taxable
            .checked_mul(policy.tax_rate())
            .ok_or(PrecisionError::Overflow("tax"))?;

        log::debug!(
            "SELL: qty={}, unit_cost={}, value={}, profit={}, exempt={}, offset={}, tax={}. \
             Position: qty={} -> {}, loss={} -> {}",
            quantity,
            unit_cost,
            sale_value,
            profit,
            exempt,
            loss_offset,
            tax,
            self.quantity_held,
            remaining,
            self.accumulated_loss,
            accumulated_loss
        );

        self.quantity_held = remaining;
        if remaining == 0 {
            self.weighted_average_cost = Decimal::ZERO;
        }
        self.accumulated_loss = accumulated_loss;

        Ok(Disposal {
            sale_value,
            profit,
            exempt,
            loss_offset,
            taxable,
            tax,
        })
    }
}
