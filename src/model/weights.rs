//! Weight vectors — the numeric machinery behind filters and votes.
//!
//! A `WeightVec` always has exactly one entry per registered operator.
//! Filters compose multiplicatively down the tree, votes compose additively
//! up the tree; both are just `WeightVec`s with different composition rules.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Error, Result};
use super::Value;

/// Operator counts are small; keep the common case off the heap.
type Weights = SmallVec<[f64; 8]>;

/// A fixed-length vector of non-negative weights, one per operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVec(Weights);

impl WeightVec {
    /// All-ones vector: the default filter (every operator fully eligible).
    pub fn ones(len: usize) -> Self {
        Self(std::iter::repeat(1.0).take(len).collect())
    }

    /// All-zeros vector: the default vote (no baseline preference).
    pub fn zeros(len: usize) -> Self {
        Self(std::iter::repeat(0.0).take(len).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        self.0.get(i).copied()
    }

    /// Elementwise product. Both operands must have the same length.
    pub fn hadamard(&self, other: &WeightVec) -> Result<WeightVec> {
        self.check_len(other.len())?;
        Ok(Self(
            self.0.iter().zip(&other.0).map(|(a, b)| a * b).collect(),
        ))
    }

    /// Elementwise sum into `self`. The additive half of vote aggregation.
    pub fn accumulate(&mut self, other: &WeightVec) -> Result<()> {
        self.check_len(other.len())?;
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a += b;
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    fn check_len(&self, got: usize) -> Result<()> {
        if self.0.len() == got {
            Ok(())
        } else {
            Err(Error::WeightLength { expected: self.0.len(), got })
        }
    }

    /// Parse a stored property into a weight vector of the expected length.
    ///
    /// Accepts a list of numerics (ints coerce to floats). Anything else, or
    /// a length mismatch, is an error — weight vectors are an engine
    /// invariant, not a best-effort value.
    pub fn from_value(value: &Value, expected_len: usize) -> Result<WeightVec> {
        let items = value.as_list().ok_or_else(|| {
            Error::Storage(format!("expected a weight list, got {}", value.type_name()))
        })?;
        if items.len() != expected_len {
            return Err(Error::WeightLength { expected: expected_len, got: items.len() });
        }
        let mut weights = Weights::with_capacity(items.len());
        for item in items {
            let w = item.as_float().ok_or_else(|| {
                Error::Storage(format!("non-numeric weight entry: {}", item.type_name()))
            })?;
            weights.push(w);
        }
        Ok(Self(weights))
    }

    /// Render as a storable property value.
    pub fn into_value(self) -> Value {
        Value::List(self.0.into_iter().map(Value::Float).collect())
    }
}

impl From<Vec<f64>> for WeightVec {
    fn from(v: Vec<f64>) -> Self {
        Self(v.into_iter().collect())
    }
}

impl<const N: usize> From<[f64; N]> for WeightVec {
    fn from(v: [f64; N]) -> Self {
        Self(v.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        assert_eq!(WeightVec::ones(3), WeightVec::from(vec![1.0, 1.0, 1.0]));
        assert_eq!(WeightVec::zeros(2), WeightVec::from(vec![0.0, 0.0]));
    }

    #[test]
    fn test_hadamard() {
        let a = WeightVec::from([2.0, 0.0, 1.0]);
        let b = WeightVec::from([3.0, 5.0, 0.5]);
        assert_eq!(a.hadamard(&b).unwrap(), WeightVec::from([6.0, 0.0, 0.5]));
    }

    #[test]
    fn test_hadamard_length_mismatch() {
        let a = WeightVec::ones(2);
        let b = WeightVec::ones(3);
        assert!(matches!(
            a.hadamard(&b),
            Err(Error::WeightLength { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_value_roundtrip() {
        let w = WeightVec::from([1.0, 0.25]);
        let v = w.clone().into_value();
        assert_eq!(WeightVec::from_value(&v, 2).unwrap(), w);
    }

    #[test]
    fn test_from_value_coerces_ints() {
        let v = Value::List(vec![Value::Int(1), Value::Int(0)]);
        assert_eq!(WeightVec::from_value(&v, 2).unwrap(), WeightVec::from([1.0, 0.0]));
    }

    #[test]
    fn test_from_value_rejects_bad_shapes() {
        assert!(WeightVec::from_value(&Value::Int(1), 1).is_err());
        let v = Value::List(vec![Value::Float(1.0)]);
        assert!(matches!(
            WeightVec::from_value(&v, 2),
            Err(Error::WeightLength { expected: 2, got: 1 })
        ));
    }

    proptest! {
        /// Vote aggregation is order-independent: accumulating child votes
        /// in any permutation yields the same result.
        #[test]
        fn accumulate_commutes(
            votes in proptest::collection::vec(
                proptest::collection::vec(0.0f64..100.0, 4),
                1..8,
            ),
            seed in any::<u64>(),
        ) {
            let mut shuffled = votes.clone();
            // Fisher-Yates driven by the seed, so the permutation is arbitrary
            // but reproducible.
            let mut state = seed | 1;
            for i in (1..shuffled.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }

            let mut a = WeightVec::zeros(4);
            for v in &votes {
                a.accumulate(&WeightVec::from(v.clone())).unwrap();
            }
            let mut b = WeightVec::zeros(4);
            for v in &shuffled {
                b.accumulate(&WeightVec::from(v.clone())).unwrap();
            }

            for (x, y) in a.iter().zip(b.iter()) {
                prop_assert!((x - y).abs() < 1e-9);
            }
        }
    }
}
