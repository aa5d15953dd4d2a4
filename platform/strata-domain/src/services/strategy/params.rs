use crate::errors::InputError;
use crate::value_objects::params::{ParamValue, Params};
use std::collections::BTreeSet;

/// Pulls typed values out of a flat parameter map, tracking which keys were
/// consumed so leftovers can be reported.
pub struct ParamReader<'a> {
    params: &'a Params,
    consumed: BTreeSet<&'a str>,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a Params) -> Self {
        Self {
            params,
            consumed: BTreeSet::new(),
        }
    }

    fn take(&mut self, name: &str) -> Option<&'a ParamValue> {
        let (key, value) = self.params.get_key_value(name)?;
        self.consumed.insert(key.as_str());
        Some(value)
    }

    pub fn float(&mut self, name: &str, default: f64, min: f64, max: f64) -> Result<f64, InputError> {
        let value = match self.take(name) {
            None => return Ok(default),
            Some(raw) => raw.as_f64().ok_or_else(|| {
                InputError::invalid_parameter(name, format!("expected a number, got {}", raw.type_name()))
            })?,
        };
        if !value.is_finite() || value < min || value > max {
            return Err(InputError::invalid_parameter(
                name,
                format!("{value} is outside [{min}, {max}]"),
            ));
        }
        Ok(value)
    }

    pub fn usize(
        &mut self,
        name: &str,
        default: usize,
        min: usize,
        max: usize,
    ) -> Result<usize, InputError> {
        let value = match self.take(name) {
            None => return Ok(default),
            Some(raw) => raw.as_i64().ok_or_else(|| {
                InputError::invalid_parameter(
                    name,
                    format!("expected an integer, got {} ({raw})", raw.type_name()),
                )
            })?,
        };
        if value < min as i64 || value > max as i64 {
            return Err(InputError::invalid_parameter(
                name,
                format!("{value} is outside [{min}, {max}]"),
            ));
        }
        Ok(value as usize)
    }

    /// Fails on the first key no getter asked for.
    pub fn finish(self) -> Result<(), InputError> {
        match self
            .params
            .keys()
            .find(|key| !self.consumed.contains(key.as_str()))
        {
            Some(unknown) => Err(InputError::invalid_parameter(
                unknown.as_str(),
                "unknown parameter",
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_defaults_and_rejects_leftovers() {
        let mut params = Params::new();
        params.insert("a".to_string(), ParamValue::Int(3));
        params.insert("b".to_string(), ParamValue::Float(2.0));
        params.insert("typo".to_string(), ParamValue::Int(1));

        let mut reader = ParamReader::new(&params);
        assert_eq!(reader.usize("a", 1, 1, 10), Ok(3));
        assert_eq!(reader.usize("b", 1, 1, 10), Ok(2));
        assert_eq!(reader.float("c", 0.5, 0.0, 1.0), Ok(0.5));
        assert_eq!(
            reader.finish(),
            Err(InputError::invalid_parameter("typo", "unknown parameter"))
        );
    }

    #[test]
    fn rejects_wrong_type_and_range() {
        let mut params = Params::new();
        params.insert("a".to_string(), ParamValue::Float(2.5));
        params.insert("b".to_string(), ParamValue::Float(-1.0));
        params.insert("c".to_string(), ParamValue::Str("x".to_string()));
        let mut reader = ParamReader::new(&params);
        assert!(reader.usize("a", 1, 1, 10).is_err());
        assert!(reader.float("b", 0.5, 0.0, 1.0).is_err());
        assert!(reader.float("c", 0.5, 0.0, 1.0).is_err());
    }
}
