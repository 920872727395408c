use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Invalid age range: min {min} is greater than max {max}")]
    InvalidAgeRange { min: u8, max: u8 },
}
