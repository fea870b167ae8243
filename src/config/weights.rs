//! Positional weight tables and weight combination rules
//!
//! Positional dropping scales the drop weight of an entry by a table
//! value indexed by its distance from the diagonal, so that fill far
//! from the diagonal is discarded more aggressively. The table is a
//! sampled closed-form curve over [0, table_size].

/// Closed-form curve used to build a positional weight table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightTableKind {
    /// k -> exp(5 - 10k/N): steep exponential decay
    #[default]
    ExpSteep,
    /// k -> 0.01 * (1000 - 1000k/N): linear decay
    Linear,
    /// k -> 1: constant (positional dropping disabled in effect)
    Constant,
    /// k -> exp(2 - 6k/N): narrow exponential decay
    ExpNarrow,
    /// k -> exp(4 - 6k/N): wide exponential decay
    ExpWide,
}

impl WeightTableKind {
    /// Evaluate the curve at position `k` of a table with `size` slots
    pub fn eval(&self, k: usize, size: usize) -> f64 {
        let t = k as f64 / size as f64;
        match self {
            WeightTableKind::ExpSteep => (5.0 - 10.0 * t).exp(),
            WeightTableKind::Linear => 0.01 * (1000.0 - 1000.0 * t),
            WeightTableKind::Constant => 1.0,
            WeightTableKind::ExpNarrow => (2.0 - 6.0 * t).exp(),
            WeightTableKind::ExpWide => (4.0 - 6.0 * t).exp(),
        }
    }

    /// Sample the curve into a table of `size + 1` weights
    pub fn make_table(&self, size: usize) -> Vec<f64> {
        (0..=size).map(|k| self.eval(k, size)).collect()
    }
}

/// Rule for combining a magnitude-based drop weight with a positional one
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CombineRule {
    /// Take the larger weight
    #[default]
    Max,
    /// Sum the weights
    Sum,
    /// Multiply the weights
    Product,
    /// Take the larger weight, but never below `floor`
    MaxWithFloor {
        /// Lower bound on the combined weight
        floor: f64,
    },
}

impl CombineRule {
    /// Identity element of the rule (combining with it changes nothing)
    pub fn neutral(&self) -> f64 {
        match self {
            CombineRule::Max | CombineRule::Sum => 0.0,
            CombineRule::Product | CombineRule::MaxWithFloor { .. } => 1.0,
        }
    }

    /// Combine two weights
    pub fn combine(&self, x: f64, y: f64) -> f64 {
        match self {
            CombineRule::Max => x.max(y),
            CombineRule::Sum => x + y,
            CombineRule::Product => x * y,
            CombineRule::MaxWithFloor { floor } => x.max(y).max(*floor),
        }
    }
}
