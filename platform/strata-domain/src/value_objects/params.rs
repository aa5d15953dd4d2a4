use crate::errors::InputError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Decimal places kept for float parameters when hashing or sampling.
pub const PARAM_DECIMALS: i32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Flat strategy parameter map. Ordered so that hashing and reporting are stable.
pub type Params = BTreeMap<String, ParamValue>;

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(value) => Some(*value as f64),
            ParamValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers, or floats without a fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            ParamValue::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                Some(*value as i64)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Str(_) => "string",
        }
    }

    pub fn rounded(&self) -> ParamValue {
        match self {
            ParamValue::Float(value) => ParamValue::Float(round_to(*value, PARAM_DECIMALS)),
            other => other.clone(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::Str(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Searchable domain of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamRange {
    Float {
        min: f64,
        max: f64,
        #[serde(default)]
        step: Option<f64>,
    },
    Int {
        min: i64,
        max: i64,
        #[serde(default = "default_int_step")]
        step: i64,
    },
    Choice {
        values: Vec<ParamValue>,
    },
}

fn default_int_step() -> i64 {
    1
}

impl ParamRange {
    pub fn float(min: f64, max: f64) -> Self {
        ParamRange::Float {
            min,
            max,
            step: None,
        }
    }

    pub fn int(min: i64, max: i64) -> Self {
        ParamRange::Int { min, max, step: 1 }
    }

    pub fn choice<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        ParamRange::Choice {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), InputError> {
        match self {
            ParamRange::Float { min, max, step } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(InputError::invalid_parameter(name, "bounds must be finite"));
                }
                if min > max {
                    return Err(InputError::invalid_parameter(
                        name,
                        format!("min {min} is greater than max {max}"),
                    ));
                }
                if let Some(step) = step {
                    if !step.is_finite() || *step <= 0.0 {
                        return Err(InputError::invalid_parameter(name, "step must be > 0"));
                    }
                }
            }
            ParamRange::Int { min, max, step } => {
                if min > max {
                    return Err(InputError::invalid_parameter(
                        name,
                        format!("min {min} is greater than max {max}"),
                    ));
                }
                if *step <= 0 {
                    return Err(InputError::invalid_parameter(name, "step must be > 0"));
                }
            }
            ParamRange::Choice { values } => {
                if values.is_empty() {
                    return Err(InputError::invalid_parameter(
                        name,
                        "choice list must not be empty",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Index of the last step-aligned value, for stepped floats and integers.
    /// `None` for continuous floats, or when the count does not fit in a `u64`.
    pub fn steps(&self) -> Option<u64> {
        match self {
            ParamRange::Float { min, max, step } => {
                let step = (*step)?;
                let raw = ((max - min) / step + 1e-9).floor();
                (raw.is_finite() && raw >= 0.0 && raw < u64::MAX as f64).then(|| raw as u64)
            }
            ParamRange::Int { min, max, step } => {
                Some(max.abs_diff(*min) / (*step).max(1).unsigned_abs())
            }
            ParamRange::Choice { .. } => None,
        }
    }

    /// Number of values [`ParamRange::grid_values`] yields, without building
    /// them. `None` when the count overflows `usize`.
    pub fn grid_len(&self, grid_points: usize) -> Option<usize> {
        let stepped = |steps: Option<u64>| {
            steps?
                .checked_add(1)
                .and_then(|count| usize::try_from(count).ok())
        };
        match self {
            ParamRange::Float { min, max, .. } if min == max => Some(1),
            ParamRange::Float { step: Some(_), .. } => stepped(self.steps()),
            ParamRange::Float { step: None, .. } => Some(grid_points.max(1)),
            ParamRange::Int { .. } => stepped(self.steps()),
            ParamRange::Choice { values } => Some(values.len()),
        }
    }

    /// Finite list of values used by exhaustive search. Continuous ranges without
    /// a step are split into `grid_points` evenly spaced values. Callers bound
    /// the size with [`ParamRange::grid_len`] first.
    pub fn grid_values(&self, grid_points: usize) -> Vec<ParamValue> {
        match self {
            ParamRange::Float { min, max, step } => {
                if min == max {
                    return vec![ParamValue::Float(*min)];
                }
                match step {
                    Some(step) => (0..=self.steps().unwrap_or(0))
                        .map(|k| ParamValue::Float(round_to(min + step * k as f64, 10)))
                        .collect(),
                    None => {
                        if grid_points <= 1 {
                            return vec![ParamValue::Float(*min)];
                        }
                        let span = max - min;
                        (0..grid_points)
                            .map(|k| {
                                let frac = k as f64 / (grid_points - 1) as f64;
                                ParamValue::Float(round_to(min + span * frac, 10))
                            })
                            .collect()
                    }
                }
            }
            ParamRange::Int { min, max, step } => {
                let step = (*step).max(1) as usize;
                (*min..=*max).step_by(step).map(ParamValue::Int).collect()
            }
            ParamRange::Choice { values } => values.clone(),
        }
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRange::Float { min, max, step } => match step {
                Some(step) => write!(f, "float[{min}, {max}] step {step}"),
                None => write!(f, "float[{min}, {max}]"),
            },
            ParamRange::Int { min, max, step } => {
                if *step == 1 {
                    write!(f, "int[{min}, {max}]")
                } else {
                    write!(f, "int[{min}, {max}] step {step}")
                }
            }
            ParamRange::Choice { values } => {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "choice{{{}}}", rendered.join(", "))
            }
        }
    }
}

/// Named parameter ranges. Iteration order is the lexical order of the names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    ranges: BTreeMap<String, ParamRange>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, range: ParamRange) -> Self {
        self.insert(name, range);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, range: ParamRange) {
        self.ranges.insert(name.into(), range);
    }

    pub fn get(&self, name: &str) -> Option<&ParamRange> {
        self.ranges.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamRange)> {
        self.ranges.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.ranges.is_empty() {
            return Err(InputError::EmptyParameterSpace);
        }
        for (name, range) in &self.ranges {
            range.validate(name)?;
        }
        Ok(())
    }
}

impl fmt::Display for ParameterSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .ranges
            .iter()
            .map(|(name, range)| format!("{name}: {range}"))
            .collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}

impl<K: Into<String>> FromIterator<(K, ParamRange)> for ParameterSpace {
    fn from_iter<T: IntoIterator<Item = (K, ParamRange)>>(iter: T) -> Self {
        Self {
            ranges: iter
                .into_iter()
                .map(|(name, range)| (name.into(), range))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_grid_without_step_is_evenly_spaced() {
        let values = ParamRange::float(0.0, 1.0).grid_values(5);
        assert_eq!(
            values,
            vec![
                ParamValue::Float(0.0),
                ParamValue::Float(0.25),
                ParamValue::Float(0.5),
                ParamValue::Float(0.75),
                ParamValue::Float(1.0),
            ]
        );
    }

    #[test]
    fn float_grid_with_step_includes_max() {
        let range = ParamRange::Float {
            min: 1.0,
            max: 2.0,
            step: Some(0.1),
        };
        let values = range.grid_values(5);
        assert_eq!(values.len(), 11);
        assert_eq!(values.last(), Some(&ParamValue::Float(2.0)));
        assert_eq!(range.grid_len(5), Some(11));
    }

    #[test]
    fn int_grid_respects_step() {
        let range = ParamRange::Int {
            min: 2,
            max: 10,
            step: 3,
        };
        assert_eq!(
            range.grid_values(5),
            vec![ParamValue::Int(2), ParamValue::Int(5), ParamValue::Int(8)]
        );
        assert_eq!(range.grid_len(5), Some(3));
    }

    #[test]
    fn grid_len_does_not_overflow_on_tiny_steps_or_wide_ints() {
        let tiny = ParamRange::Float {
            min: 0.0,
            max: 1.0,
            step: Some(1e-300),
        };
        assert_eq!(tiny.validate("x"), Ok(()));
        assert_eq!(tiny.steps(), None);
        assert_eq!(tiny.grid_len(5), None);

        let wide = ParamRange::Int {
            min: i64::MIN,
            max: i64::MAX,
            step: 1,
        };
        assert_eq!(wide.steps(), Some(u64::MAX));
        assert_eq!(wide.grid_len(5), None);

        assert_eq!(ParamRange::float(0.0, 1.0).grid_len(0), Some(1));
        assert_eq!(ParamRange::float(0.0, 1.0).grid_len(7), Some(7));
    }

    #[test]
    fn validate_rejects_inverted_bounds_and_empty_space() {
        let space = ParameterSpace::new().with("x", ParamRange::int(5, 1));
        match space.validate() {
            Err(InputError::InvalidParameter { name, .. }) => assert_eq!(name, "x"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(
            ParameterSpace::new().validate(),
            Err(InputError::EmptyParameterSpace)
        );
    }

    #[test]
    fn untagged_values_keep_int_and_float_apart() {
        let params: Params = serde_json::from_str(r#"{"a": 3, "b": 0.5, "c": true, "d": "x"}"#)
            .expect("parse params");
        assert_eq!(params["a"], ParamValue::Int(3));
        assert_eq!(params["b"], ParamValue::Float(0.5));
        assert_eq!(params["c"], ParamValue::Bool(true));
        assert_eq!(params["d"], ParamValue::Str("x".to_string()));
    }

    #[test]
    fn range_parses_from_tagged_json() {
        let space: ParameterSpace = serde_json::from_str(
            r#"{"x": {"type": "int", "min": 1, "max": 3}, "y": {"type": "choice", "values": [0.0, 1.0]}}"#,
        )
        .expect("parse space");
        assert_eq!(space.get("x"), Some(&ParamRange::int(1, 3)));
        assert_eq!(space.to_string(), "{x: int[1, 3], y: choice{0, 1}}");
    }
}
