use thiserror::Error;

use crate::Metal;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("degenerate reference for {metal}: standard {standard} must exceed ideal {ideal}")]
    DegenerateReference {
        metal: Metal,
        standard: f64,
        ideal: f64,
    },

    #[error("{index} evaluated to a non-finite value")]
    NonFiniteResult { index: &'static str },
}

impl IndexError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
