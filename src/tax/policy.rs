use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Sale value at or below which a disposal is exempt from tax
pub const EXEMPTION_THRESHOLD: Decimal = dec!(20000);

/// Rate applied to the taxable part of a gain
pub const TAX_RATE: Decimal = dec!(0.20);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("exemption threshold must not be negative: {0}")]
    NegativeThreshold(Decimal),
    #[error("tax rate must be between 0 and 1: {0}")]
    RateOutOfRange(Decimal),
}

/// Fixed policy values used when taxing disposals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxPolicy {
    exemption_threshold: Decimal,
    tax_rate: Decimal,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        TaxPolicy {
            exemption_threshold: EXEMPTION_THRESHOLD,
            tax_rate: TAX_RATE,
        }
    }
}

impl TaxPolicy {
    pub fn new(exemption_threshold: Decimal, tax_rate: Decimal) -> Result<Self, PolicyError> {
        if exemption_threshold < Decimal::ZERO {
            return Err(PolicyError::NegativeThreshold(exemption_threshold));
        }
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
            return Err(PolicyError::RateOutOfRange(tax_rate));
        }
        Ok(TaxPolicy {
            exemption_threshold,
            tax_rate,
        })
    }

    /// Build a policy from optional overrides, falling back to the defaults
    pub fn with_overrides(
        exemption_threshold: Option<Decimal>,
        tax_rate: Option<Decimal>,
    ) -> Result<Self, PolicyError> {
        let default = TaxPolicy::default();
        TaxPolicy::new(
            exemption_threshold.unwrap_or(default.exemption_threshold),
            tax_rate.unwrap_or(default.tax_rate),
        )
    }

    pub fn exemption_threshold(&self) -> Decimal {
        self.exemption_threshold
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// A sale is exempt when its total value does not exceed the threshold
    pub fn is_exempt(&self, sale_value: Decimal) -> bool {
        sale_value <= self.exemption_threshold
    }
}
