use std::borrow::Cow;

use serde::Serialize;

use crate::{IndexError, Metal};

/// Proportionality constant `K` in the unit weight `Wi = K / Si`.
pub const WEIGHT_CONSTANT: f64 = 1.0;

/// Standard (highest permissible) and ideal concentrations for one metal, in mg/L.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceValue {
    pub metal: Metal,
    pub standard: f64,
    pub ideal: f64,
}

impl ReferenceValue {
    pub const fn new(metal: Metal, standard: f64, ideal: f64) -> Self {
        Self {
            metal,
            standard,
            ideal,
        }
    }

    pub fn weight(&self) -> f64 {
        WEIGHT_CONSTANT / self.standard
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        let ok = self.standard.is_finite()
            && self.ideal.is_finite()
            && self.standard > 0.0
            && self.ideal >= 0.0
            && self.standard > self.ideal;
        if ok {
            Ok(())
        } else {
            Err(IndexError::DegenerateReference {
                metal: self.metal,
                standard: self.standard,
                ideal: self.ideal,
            })
        }
    }
}

// Standards follow the WHO drinking-water guidelines. Ideal values are zero for
// metals with no safe background level, otherwise the desirable limit.
static BUILTIN_VALUES: [ReferenceValue; 10] = [
    ReferenceValue::new(Metal::Arsenic, 0.01, 0.0),
    ReferenceValue::new(Metal::Lead, 0.01, 0.0),
    ReferenceValue::new(Metal::Cadmium, 0.003, 0.0),
    ReferenceValue::new(Metal::Chromium, 0.05, 0.0),
    ReferenceValue::new(Metal::Mercury, 0.006, 0.0),
    ReferenceValue::new(Metal::Nickel, 0.07, 0.0),
    ReferenceValue::new(Metal::Copper, 2.0, 0.05),
    ReferenceValue::new(Metal::Zinc, 3.0, 0.0),
    ReferenceValue::new(Metal::Iron, 0.3, 0.1),
    ReferenceValue::new(Metal::Manganese, 0.4, 0.1),
];

static BUILTIN: ReferenceTable = ReferenceTable {
    entries: Cow::Borrowed(&BUILTIN_VALUES),
};

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    entries: Cow<'static, [ReferenceValue]>,
}

impl ReferenceTable {
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Builds a table from explicit values. Later entries for the same metal win.
    pub fn from_values(values: impl IntoIterator<Item = ReferenceValue>) -> Self {
        let mut entries: Vec<ReferenceValue> = Vec::new();
        for value in values {
            match entries.iter_mut().find(|e| e.metal == value.metal) {
                Some(existing) => *existing = value,
                None => entries.push(value),
            }
        }
        Self {
            entries: Cow::Owned(entries),
        }
    }

    pub fn get(&self, metal: Metal) -> Option<&ReferenceValue> {
        self.entries.iter().find(|e| e.metal == metal)
    }

    pub fn entries(&self) -> &[ReferenceValue] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        self.entries.iter().try_for_each(ReferenceValue::validate)
    }
}
