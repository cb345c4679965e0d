mod engine;
mod error;
mod tax;
mod types;

pub use engine::{Projector, run_projection};
pub use error::ProjectionError;
pub use tax::{deferred_tax, scaled_for_joint_filing, tiered_tax};
pub use types::{
    ChartRow, IntegerYearRecord, Projection, ProjectionParams, TaxRegime, TaxYear, TierSchedule,
    YearRecord,
};
