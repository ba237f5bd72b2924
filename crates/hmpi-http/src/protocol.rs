use std::io;

use hmpi_core::{IndexResult, MetalContribution};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const MISSING_CONCENTRATIONS: &str = "Invalid input: heavyMetalConcentrations is required and should be an object with metal concentrations.";
pub const NON_NUMERIC_CONCENTRATION: &str = "Invalid numeric values in heavyMetalConcentrations.";
pub const NO_NUMERIC_CONCENTRATION: &str =
    "Please provide at least one numeric metal concentration.";
pub const INTERNAL_CALCULATION_ERROR: &str = "Internal server error while calculating indices.";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed http request: {0}")]
    Malformed(&'static str),

    #[error("request line and headers exceed {limit} bytes")]
    HeadTooLarge { limit: u64 },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("{0}")]
    InvalidPayload(&'static str),
}

impl RequestError {
    pub const fn status(&self) -> u16 {
        match self {
            Self::BodyTooLarge { .. } => 413,
            Self::HeadTooLarge { .. } => 431,
            Self::Io(_) => 500,
            Self::Malformed(_) | Self::InvalidPayload(_) => 400,
        }
    }
}

/// Body of `POST /api/hmpi/calculate`. Other top-level fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct CalculateRequest {
    #[serde(rename = "heavyMetalConcentrations", default)]
    pub heavy_metal_concentrations: Option<Value>,
}

impl CalculateRequest {
    /// Malformed JSON is treated the same as a missing concentrations object.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Returns `(key, mg/L)` pairs. `null` and blank strings mean "not measured"
    /// and are skipped; strings may use a comma as decimal separator.
    pub fn concentrations(&self) -> Result<Vec<(String, f64)>, RequestError> {
        let Some(Value::Object(map)) = &self.heavy_metal_concentrations else {
            return Err(RequestError::InvalidPayload(MISSING_CONCENTRATIONS));
        };
        if map.is_empty() {
            return Err(RequestError::InvalidPayload(MISSING_CONCENTRATIONS));
        }

        let mut parsed = Vec::with_capacity(map.len());
        for (key, value) in map {
            if let Some(number) = parse_concentration(value)? {
                parsed.push((key.clone(), number));
            }
        }
        if parsed.is_empty() {
            return Err(RequestError::InvalidPayload(NO_NUMERIC_CONCENTRATION));
        }
        Ok(parsed)
    }
}

fn parse_concentration(value: &Value) -> Result<Option<f64>, RequestError> {
    let number = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.replacen(',', ".", 1).parse::<f64>().ok()
        }
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(RequestError::InvalidPayload(NON_NUMERIC_CONCENTRATION)),
    }
}

#[derive(Debug, Serialize)]
pub struct CalculateResponse {
    #[serde(flatten)]
    pub result: IndexResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metals: Option<Vec<MetalContribution>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
