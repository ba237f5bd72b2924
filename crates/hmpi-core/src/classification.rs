use std::fmt;

use serde::Serialize;

/// HPI at or above this value is no longer `Safe`.
pub const CAUTION_THRESHOLD: f64 = 50.0;
/// HPI at or above this value is `Unsafe`; 100 is the critical pollution index.
pub const UNSAFE_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    Safe,
    Caution,
    Unsafe,
}

impl Classification {
    /// Lower bounds are inclusive: a value sitting on a threshold takes the worse class.
    pub fn from_hpi(hpi: f64) -> Self {
        if hpi >= UNSAFE_THRESHOLD {
            Self::Unsafe
        } else if hpi >= CAUTION_THRESHOLD {
            Self::Caution
        } else {
            Self::Safe
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Caution => "Caution",
            Self::Unsafe => "Unsafe",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_map_to_the_worse_class() {
        assert_eq!(Classification::from_hpi(0.0), Classification::Safe);
        assert_eq!(Classification::from_hpi(49.999), Classification::Safe);
        assert_eq!(Classification::from_hpi(50.0), Classification::Caution);
        assert_eq!(Classification::from_hpi(99.999), Classification::Caution);
        assert_eq!(Classification::from_hpi(100.0), Classification::Unsafe);
        assert_eq!(Classification::from_hpi(2500.0), Classification::Unsafe);
    }

    #[test]
    fn labels_match_display() {
        for class in [
            Classification::Safe,
            Classification::Caution,
            Classification::Unsafe,
        ] {
            assert_eq!(class.to_string(), class.as_str());
        }
    }
}
