use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::{Classification, IndexError, Metal, ReferenceTable, ReferenceValue};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexResult {
    #[serde(rename = "HPI")]
    pub hpi: f64,
    #[serde(rename = "HEI")]
    pub hei: f64,
    #[serde(rename = "MI")]
    pub mi: f64,
    #[serde(rename = "Cd")]
    pub cd: f64,
    #[serde(rename = "Nemerow")]
    pub nemerow: f64,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetalContribution {
    pub metal: Metal,
    pub measured: f64,
    pub standard: f64,
    pub ideal: f64,
    pub weight: f64,
    pub sub_index: f64,
    pub ratio: f64,
}

/// An index result together with the per-metal terms that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub result: IndexResult,
    pub contributions: Vec<MetalContribution>,
    pub ignored: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Calculator<'a> {
    table: &'a ReferenceTable,
}

impl Calculator<'static> {
    pub fn builtin() -> Self {
        Self::new(ReferenceTable::builtin())
    }
}

impl<'a> Calculator<'a> {
    pub const fn new(table: &'a ReferenceTable) -> Self {
        Self { table }
    }

    pub const fn table(&self) -> &'a ReferenceTable {
        self.table
    }

    pub fn calculate<I, K>(&self, readings: I) -> Result<IndexResult, IndexError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        self.assess(readings).map(|a| a.result)
    }

    /// `Qi` uses the absolute deviation from the ideal value, so readings below a
    /// non-zero ideal still count as a departure from it.
    ///
    /// Keys that name no metal in the reference table are skipped and reported in
    /// `ignored`. Contributions are ordered by metal so sums do not depend on
    /// input order.
    pub fn assess<I, K>(&self, readings: I) -> Result<Assessment, IndexError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut measured: BTreeMap<Metal, (f64, ReferenceValue)> = BTreeMap::new();
        let mut ignored = Vec::new();
        let mut seen_any = false;

        for (key, value) in readings {
            seen_any = true;
            let key = key.as_ref();
            let Some(reference) = Metal::parse(key).and_then(|m| self.table.get(m)) else {
                ignored.push(key.to_string());
                continue;
            };
            if !value.is_finite() || value < 0.0 {
                return Err(IndexError::invalid_input(format!(
                    "concentration for {key} must be a finite non-negative number"
                )));
            }
            if measured
                .insert(reference.metal, (value, *reference))
                .is_some()
            {
                return Err(IndexError::invalid_input(format!(
                    "{} given more than once",
                    reference.metal
                )));
            }
        }

        if !seen_any {
            return Err(IndexError::invalid_input(
                "at least one metal concentration is required",
            ));
        }
        if measured.is_empty() {
            return Err(IndexError::invalid_input(format!(
                "no recognised metal in input; expected one of: {}",
                known_metals(self.table)
            )));
        }
        ignored.sort();

        let mut contributions = Vec::with_capacity(measured.len());
        for (metal, (value, reference)) in measured {
            reference.validate()?;
            let weight = reference.weight();
            contributions.push(MetalContribution {
                metal,
                measured: value,
                standard: reference.standard,
                ideal: reference.ideal,
                weight,
                sub_index: (value - reference.ideal).abs()
                    / (reference.standard - reference.ideal)
                    * 100.0,
                ratio: value / reference.standard,
            });
        }

        let result = aggregate(&contributions)?;
        Ok(Assessment {
            result,
            contributions,
            ignored,
        })
    }
}

/// Computes indices from raw `metal -> mg/L` readings using the built-in table.
pub fn calculate_indices(readings: &HashMap<String, f64>) -> Result<IndexResult, IndexError> {
    Calculator::builtin().calculate(readings.iter().map(|(k, v)| (k.as_str(), *v)))
}

fn aggregate(contributions: &[MetalContribution]) -> Result<IndexResult, IndexError> {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut ratio_sum = 0.0;
    let mut max_ratio = 0.0_f64;
    let mut contamination = 0.0;

    for c in contributions {
        weighted_sum += c.weight * c.sub_index;
        weight_sum += c.weight;
        ratio_sum += c.ratio;
        max_ratio = max_ratio.max(c.ratio);
        contamination += c.ratio - 1.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = contributions.len() as f64;
    let mean_ratio = ratio_sum / n;

    let hpi = finite("HPI", weighted_sum / weight_sum)?;
    let hei = finite("HEI", ratio_sum)?;
    let mi = finite("MI", mean_ratio)?;
    let cd = finite("Cd", contamination)?;
    let nemerow = finite(
        "Nemerow",
        ((max_ratio.powi(2) + mean_ratio.powi(2)) / 2.0).sqrt(),
    )?;

    Ok(IndexResult {
        hpi,
        hei,
        mi,
        cd,
        nemerow,
        classification: Classification::from_hpi(hpi),
    })
}

fn finite(index: &'static str, value: f64) -> Result<f64, IndexError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(IndexError::NonFiniteResult { index })
    }
}

fn known_metals(table: &ReferenceTable) -> String {
    table
        .entries()
        .iter()
        .map(|e| e.metal.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn single(metal: &str, value: f64) -> Assessment {
        Calculator::builtin()
            .assess([(metal, value)])
            .expect("single metal assessment")
    }

    #[test]
    fn ideal_concentration_has_zero_sub_index() {
        let out = single("manganese", 0.1);
        assert_eq!(out.contributions.len(), 1);
        assert!(close(out.contributions[0].sub_index, 0.0));
        assert!(close(out.result.hpi, 0.0));
        assert_eq!(out.result.classification, Classification::Safe);
    }

    #[test]
    fn standard_concentration_has_full_sub_index() {
        let out = single("iron", 0.3);
        let c = &out.contributions[0];
        assert!(close(c.sub_index, 100.0));
        assert!(close(c.ratio, 1.0));
        assert!(close(out.result.hpi, 100.0));
        assert!(close(out.result.hei, 1.0));
        assert!(close(out.result.mi, 1.0));
        assert!(close(out.result.cd, 0.0));
        assert!(close(out.result.nemerow, 1.0));
        assert_eq!(out.result.classification, Classification::Unsafe);
    }

    #[test]
    fn below_ideal_reading_counts_as_deviation() {
        let out = single("iron", 0.0);
        let c = &out.contributions[0];
        assert!(c.sub_index >= 0.0);
        assert!(close(c.sub_index, 50.0));
        assert!(out.result.hpi >= 0.0);
        assert!(close(out.result.hpi, 50.0));
        assert_eq!(out.result.classification, Classification::Caution);

        for (metal, value) in [("copper", 0.0), ("manganese", 0.05)] {
            let out = single(metal, value);
            assert!(out.result.hpi > 0.0, "{metal} below ideal gave {}", out.result.hpi);
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        let out = Calculator::builtin().calculate(Vec::<(&str, f64)>::new());
        assert!(matches!(out, Err(IndexError::InvalidInput(_))));
    }

    #[test]
    fn unrecognised_metals_only_is_rejected() {
        let out = Calculator::builtin().calculate([("uranium", 0.1), ("latitude", 28.6)]);
        assert!(matches!(out, Err(IndexError::InvalidInput(_))));
    }

    #[test]
    fn unknown_keys_are_ignored_and_reported() {
        let out = Calculator::builtin()
            .assess([("lead", 0.005), ("uranium", 0.2), ("boron", 1.0)])
            .expect("assessment");
        assert_eq!(out.contributions.len(), 1);
        assert_eq!(out.ignored, vec!["boron".to_string(), "uranium".to_string()]);
    }

    #[test]
    fn negative_and_non_finite_values_are_rejected() {
        let calc = Calculator::builtin();
        assert!(matches!(
            calc.calculate([("lead", -0.01)]),
            Err(IndexError::InvalidInput(_))
        ));
        assert!(matches!(
            calc.calculate([("lead", f64::NAN)]),
            Err(IndexError::InvalidInput(_))
        ));
        assert!(matches!(
            calc.calculate([("lead", f64::INFINITY)]),
            Err(IndexError::InvalidInput(_))
        ));
    }

    #[test]
    fn name_and_symbol_for_same_metal_is_rejected() {
        let out = Calculator::builtin().calculate([("lead", 0.01), ("Pb", 0.02)]);
        assert!(matches!(out, Err(IndexError::InvalidInput(_))));
    }

    #[test]
    fn degenerate_reference_is_reported() {
        let table = ReferenceTable::from_values([ReferenceValue::new(Metal::Iron, 0.3, 0.3)]);
        let out = Calculator::new(&table).calculate([("iron", 0.2)]);
        assert!(matches!(
            out,
            Err(IndexError::DegenerateReference {
                metal: Metal::Iron,
                ..
            })
        ));
    }

    #[test]
    fn metals_missing_from_table_do_not_contribute() {
        let table = ReferenceTable::from_values([ReferenceValue::new(Metal::Zinc, 3.0, 0.0)]);
        let out = Calculator::new(&table)
            .assess([("zinc", 1.5), ("lead", 0.5)])
            .expect("assessment");
        assert_eq!(out.contributions.len(), 1);
        assert_eq!(out.ignored, vec!["lead".to_string()]);
        assert!(close(out.result.hpi, 50.0));
        assert_eq!(out.result.classification, Classification::Caution);
    }

    #[test]
    fn input_order_does_not_change_the_result() {
        let calc = Calculator::builtin();
        let forward = calc
            .calculate([("cadmium", 0.002), ("copper", 1.1), ("zinc", 0.7)])
            .expect("forward");
        let reverse = calc
            .calculate([("zinc", 0.7), ("copper", 1.1), ("cadmium", 0.002)])
            .expect("reverse");
        assert_eq!(forward, reverse);
    }

    #[test]
    fn contamination_degree_is_signed() {
        let below = single("lead", 0.005).result;
        assert!(close(below.cd, -0.5));
        let above = single("lead", 0.03).result;
        assert!(close(above.cd, 2.0));
    }

    #[test]
    fn result_serializes_with_wire_names() {
        let out = single("lead", 0.01).result;
        let value = serde_json::to_value(&out).expect("serialize");
        for key in ["HPI", "HEI", "MI", "Cd", "Nemerow"] {
            assert!(value.get(key).and_then(serde_json::Value::as_f64).is_some());
        }
        assert_eq!(
            value.get("classification").and_then(|v| v.as_str()),
            Some("Unsafe")
        );
    }
}
