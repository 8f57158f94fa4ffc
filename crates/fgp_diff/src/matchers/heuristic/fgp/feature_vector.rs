use std::cmp::Ordering;

use crate::errors::{MatchError, Result};

/// Sparse vector of weights indexed by fingerprint index.
///
/// Indices are kept sorted and absent entries are zero. Every operation
/// returns a new vector, once built a vector is never mutated.
#[derive(Debug, Clone, Default)]
pub struct FeatureVector {
    indices: Vec<u32>,
    values: Vec<f64>,
    sum: f64,
}

impl PartialEq for FeatureVector {
    fn eq(&self, other: &Self) -> bool {
        self.indices == other.indices && self.values == other.values
    }
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vector with a single entry.
    pub fn unit(index: u32, value: f64) -> Self {
        let mut v = Self::new();
        if value != 0.0 {
            v.indices.push(index);
            v.values.push(value);
            v.sum = value;
        }
        v
    }

    /// Builds a vector from possibly unsorted, possibly repeated entries,
    /// repeated indices are summed.
    pub fn from_entries(entries: impl IntoIterator<Item = (u32, f64)>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by_key(|(i, _)| *i);
        let mut v = Self::new();
        for (i, x) in entries {
            match v.indices.last() {
                Some(last) if *last == i => {
                    if let Some(y) = v.values.last_mut() {
                        *y += x;
                    }
                }
                _ => {
                    v.indices.push(i);
                    v.values.push(x);
                }
            }
        }
        v.drop_zeros();
        v
    }

    pub fn get(&self, index: u32) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(i) => self.values[i],
            Err(_) => 0.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub fn add(&self, other: &Self) -> Self {
        self.merge(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.merge(other, |a, b| a - b)
    }

    /// Index-wise minimum.
    pub fn intersect(&self, other: &Self) -> Self {
        self.merge(other, f64::min)
    }

    /// Index-wise maximum.
    pub fn union(&self, other: &Self) -> Self {
        self.merge(other, f64::max)
    }

    /// Scales every stored entry, entries scaled to zero are kept.
    pub fn scale(&self, factor: f64) -> Self {
        let values: Vec<f64> = self.values.iter().map(|x| x * factor).collect();
        Self {
            indices: self.indices.clone(),
            sum: values.iter().sum(),
            values,
        }
    }

    /// Index-wise product.
    pub fn scale_by(&self, factors: &Self) -> Self {
        let mut out = Self::new();
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() && j < factors.indices.len() {
            match self.indices[i].cmp(&factors.indices[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    out.indices.push(self.indices[i]);
                    out.values.push(self.values[i] * factors.values[j]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.drop_zeros();
        out
    }

    pub fn abs(&self) -> Self {
        self.map_values(f64::abs)
    }

    pub fn negate(&self) -> Self {
        self.map_values(|x| -x)
    }

    /// `(Σ min, Σ max)` over the union of indices.
    pub fn jaccard_parts(&self, other: &Self) -> (f64, f64) {
        let mut intersection = 0.0;
        let mut union = 0.0;
        self.for_each_pair(other, |a, b| {
            intersection += a.min(b);
            union += a.max(b);
        });
        (intersection, union)
    }

    pub fn jaccard_similarity(&self, other: &Self) -> Result<f64> {
        if self.sum == 0.0 && other.sum == 0.0 {
            return Ok(0.0);
        }
        let (intersection, union) = self.jaccard_parts(other);
        jaccard_from_parts(intersection, union)
    }

    /// Cheap bound, never below [`Self::jaccard_similarity`] for non-negative vectors.
    pub fn jaccard_similarity_upper_bound(&self, other: &Self) -> f64 {
        let max = self.sum.max(other.sum);
        if max == 0.0 {
            0.0
        } else {
            self.sum.min(other.sum) / max
        }
    }

    /// `Σ |a - b|`
    pub fn cost(&self, other: &Self) -> f64 {
        let mut cost = 0.0;
        self.for_each_pair(other, |a, b| cost += (a - b).abs());
        cost
    }

    /// Cheap bound, never above [`Self::cost`].
    pub fn cost_lower_bound(&self, other: &Self) -> f64 {
        (self.sum - other.sum).abs()
    }

    fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        let mut out = Self {
            indices: self.indices.clone(),
            values: self.values.iter().map(|x| f(*x)).collect(),
            sum: 0.0,
        };
        out.drop_zeros();
        out
    }

    /// Applies `f` on the union of indices, absent entries read as zero.
    fn merge(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let mut out = Self {
            indices: Vec::with_capacity(self.len() + other.len()),
            values: Vec::with_capacity(self.len() + other.len()),
            sum: 0.0,
        };
        let (mut i, mut j) = (0, 0);
        loop {
            let (index, x) = match (self.indices.get(i), other.indices.get(j)) {
                (None, None) => break,
                (Some(a), None) => {
                    i += 1;
                    (*a, f(self.values[i - 1], 0.0))
                }
                (None, Some(b)) => {
                    j += 1;
                    (*b, f(0.0, other.values[j - 1]))
                }
                (Some(a), Some(b)) => match a.cmp(b) {
                    Ordering::Less => {
                        i += 1;
                        (*a, f(self.values[i - 1], 0.0))
                    }
                    Ordering::Greater => {
                        j += 1;
                        (*b, f(0.0, other.values[j - 1]))
                    }
                    Ordering::Equal => {
                        i += 1;
                        j += 1;
                        (*a, f(self.values[i - 1], other.values[j - 1]))
                    }
                },
            };
            out.indices.push(index);
            out.values.push(x);
        }
        out.drop_zeros();
        out
    }

    fn for_each_pair(&self, other: &Self, mut f: impl FnMut(f64, f64)) {
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() || j < other.indices.len() {
            let ord = match (self.indices.get(i), other.indices.get(j)) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                _ => Ordering::Greater,
            };
            match ord {
                Ordering::Less => {
                    f(self.values[i], 0.0);
                    i += 1;
                }
                Ordering::Greater => {
                    f(0.0, other.values[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    f(self.values[i], other.values[j]);
                    i += 1;
                    j += 1;
                }
            }
        }
    }

    fn drop_zeros(&mut self) {
        let mut k = 0;
        for i in 0..self.indices.len() {
            if self.values[i] != 0.0 {
                self.indices[k] = self.indices[i];
                self.values[k] = self.values[i];
                k += 1;
            }
        }
        self.indices.truncate(k);
        self.values.truncate(k);
        self.sum = self.values.iter().sum();
    }
}

/// `intersection / union`, zero when both are zero.
pub fn jaccard_from_parts(intersection: f64, union: f64) -> Result<f64> {
    if union == 0.0 {
        if intersection != 0.0 {
            return Err(MatchError::InconsistentJaccard {
                intersection,
                union,
            });
        }
        return Ok(0.0);
    }
    Ok(intersection / union)
}
