use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("invalid tax regime {name} = {value}: {reason}")]
    InvalidRegime {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("projection horizon must be at least one year, got {0}")]
    InvalidHorizon(u32),
}
