pub mod engine;
pub mod policy;
pub mod position;

pub use engine::{calculate_taxes, EngineError, LedgerEntry, Simulation};
pub use policy::TaxPolicy;
