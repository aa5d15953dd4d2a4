//! Sampling, grid expansion and unit-cube encoding over a [`ParameterSpace`].

use rand::Rng;
use strata_domain::value_objects::params::{
    round_to, ParamRange, ParamValue, ParameterSpace, Params, PARAM_DECIMALS,
};

/// Cartesian product of every dimension's grid values, in lexical name order.
pub fn expand_grid(space: &ParameterSpace, grid_points: usize) -> Vec<Params> {
    let mut out: Vec<Params> = vec![Params::new()];
    for (name, range) in space.iter() {
        let values = range.grid_values(grid_points);
        let mut next: Vec<Params> = Vec::with_capacity(out.len() * values.len());
        for base in &out {
            for value in &values {
                let mut assignment = base.clone();
                assignment.insert(name.clone(), value.clone());
                next.push(assignment);
            }
        }
        out = next;
    }
    out
}

/// Number of assignments `expand_grid` would produce, computed without
/// expanding. `None` when it overflows `usize`.
pub fn grid_size(space: &ParameterSpace, grid_points: usize) -> Option<usize> {
    space.iter().try_fold(1usize, |acc, (_, range)| {
        acc.checked_mul(range.grid_len(grid_points)?)
    })
}

fn int_at(min: i64, step: i64, k: u64) -> i64 {
    (i128::from(min) + i128::from(step.max(1)) * i128::from(k)) as i64
}

pub fn sample<R: Rng + ?Sized>(space: &ParameterSpace, rng: &mut R) -> Params {
    space
        .iter()
        .map(|(name, range)| (name.clone(), sample_value(range, rng)))
        .collect()
}

fn sample_value<R: Rng + ?Sized>(range: &ParamRange, rng: &mut R) -> ParamValue {
    match range {
        ParamRange::Float { min, max, step } => {
            if min >= max {
                return ParamValue::Float(*min);
            }
            let raw = match step {
                Some(step) => {
                    let steps = ((max - min) / step + 1e-9).floor() as u64;
                    min + step * rng.gen_range(0..=steps) as f64
                }
                None => rng.gen_range(*min..=*max),
            };
            ParamValue::Float(round_to(raw, PARAM_DECIMALS).clamp(*min, *max))
        }
        ParamRange::Int { min, step, .. } => {
            let steps = range.steps().unwrap_or(0);
            ParamValue::Int(int_at(*min, *step, rng.gen_range(0..=steps)))
        }
        ParamRange::Choice { values } => values[rng.gen_range(0..values.len())].clone(),
    }
}

/// Maps an assignment into `[0, 1]^d`. Integer and categorical dimensions use
/// their ordinal position.
pub fn encode(space: &ParameterSpace, params: &Params) -> Vec<f64> {
    space
        .iter()
        .map(|(name, range)| match params.get(name) {
            Some(value) => encode_value(range, value),
            None => 0.5,
        })
        .collect()
}

fn encode_value(range: &ParamRange, value: &ParamValue) -> f64 {
    let unit = match range {
        ParamRange::Float { min, max, .. } => {
            if max <= min {
                return 0.5;
            }
            (value.as_f64().unwrap_or(*min) - min) / (max - min)
        }
        ParamRange::Int { min, step, .. } => {
            let steps = range.steps().unwrap_or(0);
            if steps == 0 {
                return 0.5;
            }
            let offset = value.as_i64().unwrap_or(*min).saturating_sub(*min).max(0);
            let k = offset.unsigned_abs() / (*step).max(1).unsigned_abs();
            k as f64 / steps as f64
        }
        ParamRange::Choice { values } => {
            if values.len() <= 1 {
                return 0.5;
            }
            let idx = values.iter().position(|v| v == value).unwrap_or(0);
            idx as f64 / (values.len() - 1) as f64
        }
    };
    unit.clamp(0.0, 1.0)
}

/// Inverse of [`encode`], snapping to the nearest representable value.
pub fn decode(space: &ParameterSpace, point: &[f64]) -> Params {
    space
        .iter()
        .zip(point)
        .map(|((name, range), u)| (name.clone(), decode_value(range, u.clamp(0.0, 1.0))))
        .collect()
}

fn decode_value(range: &ParamRange, unit: f64) -> ParamValue {
    match range {
        ParamRange::Float { min, max, step } => {
            let raw = min + unit * (max - min);
            let snapped = match step {
                Some(step) => min + ((raw - min) / step).round() * step,
                None => raw,
            };
            ParamValue::Float(round_to(snapped, PARAM_DECIMALS).clamp(*min, *max))
        }
        ParamRange::Int { min, step, .. } => {
            let steps = range.steps().unwrap_or(0);
            let k = ((unit * steps as f64).round() as u64).min(steps);
            ParamValue::Int(int_at(*min, *step, k))
        }
        ParamRange::Choice { values } => {
            let last = values.len().saturating_sub(1);
            let idx = (unit * last as f64).round() as usize;
            values[idx.min(last)].clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn space() -> ParameterSpace {
        ParameterSpace::new()
            .with("a", ParamRange::int(1, 5))
            .with("b", ParamRange::float(0.0, 2.0))
            .with("c", ParamRange::choice(["x", "y", "z"]))
    }

    #[test]
    fn expand_grid_is_deterministic() {
        let grid = expand_grid(&space(), 3);
        assert_eq!(grid.len(), 5 * 3 * 3);
        assert_eq!(grid_size(&space(), 3), Some(45));
        assert_eq!(grid, expand_grid(&space(), 3));
        assert_eq!(grid[0]["a"], ParamValue::Int(1));
        assert_eq!(grid[0]["b"], ParamValue::Float(0.0));
        assert_eq!(grid[1]["c"], ParamValue::Str("y".to_string()));
    }

    #[test]
    fn samples_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let params = sample(&space(), &mut rng);
            let a = params["a"].as_i64().expect("int");
            assert!((1..=5).contains(&a));
            let b = params["b"].as_f64().expect("float");
            assert!((0.0..=2.0).contains(&b));
            assert_eq!(b, round_to(b, PARAM_DECIMALS));
        }
    }

    #[test]
    fn encode_decode_recovers_discrete_values() {
        let space = space();
        let mut params = Params::new();
        params.insert("a".to_string(), ParamValue::Int(4));
        params.insert("b".to_string(), ParamValue::Float(0.5));
        params.insert("c".to_string(), ParamValue::Str("z".to_string()));
        let point = encode(&space, &params);
        assert_eq!(point, vec![0.75, 0.25, 1.0]);
        assert_eq!(decode(&space, &point), params);
    }
}
