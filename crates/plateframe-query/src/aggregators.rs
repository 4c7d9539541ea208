//! Reduction operators and their aggregator implementations.
//!
//! Each operator implements the [`Aggregator`] trait for use in grouped
//! reductions. `merge` folds an ordered partial state into this one, which
//! is what keeps `first`/`last` correct when the parallel backend splits a
//! table into row chunks.

use std::any::Any;

use serde::Deserialize;

use plateframe_types::{PlateError, Result, Value, ValueKind};

/// The statistic applied to collapse a numeric column within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Reduction {
    Mean,
    Median,
    First,
    Last,
    Max,
    Min,
}

impl Reduction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Median => "median",
            Reduction::First => "first",
            Reduction::Last => "last",
            Reduction::Max => "max",
            Reduction::Min => "min",
        }
    }

    /// A fresh aggregator for this operator.
    pub fn aggregator(&self) -> Box<dyn Aggregator> {
        match self {
            Reduction::Mean => Box::new(MeanAggregator::new()),
            Reduction::Median => Box::new(MedianAggregator::new()),
            Reduction::First => Box::new(FirstAggregator::new()),
            Reduction::Last => Box::new(LastAggregator::new()),
            Reduction::Max => Box::new(MaxAggregator::new()),
            Reduction::Min => Box::new(MinAggregator::new()),
        }
    }
}

impl std::str::FromStr for Reduction {
    type Err = PlateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Reduction::Mean),
            "median" => Ok(Reduction::Median),
            "first" => Ok(Reduction::First),
            "last" => Ok(Reduction::Last),
            "max" => Ok(Reduction::Max),
            "min" => Ok(Reduction::Min),
            other => Err(PlateError::UnsupportedReduction(other.to_string())),
        }
    }
}

impl TryFrom<String> for Reduction {
    type Error = PlateError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl std::fmt::Display for Reduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for grouped-reduction state.
pub trait Aggregator: Send + Sync {
    /// Fold one value into the state.
    fn add(&mut self, value: &Value);

    /// Fold another aggregator's state into this one. Callers merge partial
    /// states in row order.
    fn merge(&mut self, other: &dyn Aggregator);

    /// Produce the reduced value.
    fn finalize(&mut self) -> Value;

    /// Output kind given the input column's kind.
    fn output_kind(&self, input: ValueKind) -> ValueKind;

    fn box_clone(&self) -> Box<dyn Aggregator>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Aggregator> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Missing-skipping arithmetic mean. `[10, missing, 30]` reduces to 20,
/// not missing: raw per-object tables routinely contain sparse nulls from
/// failed segmentations.
#[derive(Clone)]
pub struct MeanAggregator {
    sum: f64,
    count: u64,
}

impl MeanAggregator {
    pub fn new() -> Self {
        MeanAggregator { sum: 0.0, count: 0 }
    }
}

impl Default for MeanAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator for MeanAggregator {
    fn add(&mut self, value: &Value) {
        if let Some(x) = value.as_f64() {
            self.sum += x;
            self.count += 1;
        }
    }

    fn merge(&mut self, other: &dyn Aggregator) {
        if let Some(o) = other.as_any().downcast_ref::<MeanAggregator>() {
            self.sum += o.sum;
            self.count += o.count;
        }
    }

    fn finalize(&mut self) -> Value {
        if self.count == 0 {
            Value::Undefined
        } else {
            Value::Float(self.sum / self.count as f64)
        }
    }

    fn output_kind(&self, _input: ValueKind) -> ValueKind {
        ValueKind::Float
    }

    fn box_clone(&self) -> Box<dyn Aggregator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Median of the non-missing values; even counts average the two middles.
#[derive(Clone)]
pub struct MedianAggregator {
    values: Vec<f64>,
}

impl MedianAggregator {
    pub fn new() -> Self {
        MedianAggregator { values: Vec::new() }
    }
}

impl Default for MedianAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator for MedianAggregator {
    fn add(&mut self, value: &Value) {
        if let Some(x) = value.as_f64() {
            self.values.push(x);
        }
    }

    fn merge(&mut self, other: &dyn Aggregator) {
        if let Some(o) = other.as_any().downcast_ref::<MedianAggregator>() {
            self.values.extend_from_slice(&o.values);
        }
    }

    fn finalize(&mut self) -> Value {
        if self.values.is_empty() {
            return Value::Undefined;
        }
        self.values
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = self.values.len();
        let median = if n % 2 == 1 {
            self.values[n / 2]
        } else {
            (self.values[n / 2 - 1] + self.values[n / 2]) / 2.0
        };
        Value::Float(median)
    }

    fn output_kind(&self, _input: ValueKind) -> ValueKind {
        ValueKind::Float
    }

    fn box_clone(&self) -> Box<dyn Aggregator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// First value in row order, missing included.
#[derive(Clone)]
pub struct FirstAggregator {
    value: Option<Value>,
}

impl FirstAggregator {
    pub fn new() -> Self {
        FirstAggregator { value: None }
    }
}

impl Default for FirstAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator for FirstAggregator {
    fn add(&mut self, value: &Value) {
        if self.value.is_none() {
            self.value = Some(value.clone());
        }
    }

    fn merge(&mut self, other: &dyn Aggregator) {
        if self.value.is_none() {
            if let Some(o) = other.as_any().downcast_ref::<FirstAggregator>() {
                self.value = o.value.clone();
            }
        }
    }

    fn finalize(&mut self) -> Value {
        self.value.take().unwrap_or(Value::Undefined)
    }

    fn output_kind(&self, input: ValueKind) -> ValueKind {
        input
    }

    fn box_clone(&self) -> Box<dyn Aggregator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Last value in row order, missing included.
#[derive(Clone)]
pub struct LastAggregator {
    value: Option<Value>,
}

impl LastAggregator {
    pub fn new() -> Self {
        LastAggregator { value: None }
    }
}

impl Default for LastAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator for LastAggregator {
    fn add(&mut self, value: &Value) {
        self.value = Some(value.clone());
    }

    fn merge(&mut self, other: &dyn Aggregator) {
        if let Some(o) = other.as_any().downcast_ref::<LastAggregator>() {
            if o.value.is_some() {
                self.value = o.value.clone();
            }
        }
    }

    fn finalize(&mut self) -> Value {
        self.value.take().unwrap_or(Value::Undefined)
    }

    fn output_kind(&self, input: ValueKind) -> ValueKind {
        input
    }

    fn box_clone(&self) -> Box<dyn Aggregator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Minimum of the non-missing numeric values.
#[derive(Clone)]
pub struct MinAggregator {
    min_int: Option<i64>,
    min_float: Option<f64>,
}

impl MinAggregator {
    pub fn new() -> Self {
        MinAggregator {
            min_int: None,
            min_float: None,
        }
    }
}

impl Default for MinAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator for MinAggregator {
    fn add(&mut self, value: &Value) {
        match value {
            Value::Integer(i) => {
                self.min_int = Some(self.min_int.map_or(*i, |m| m.min(*i)));
            }
            Value::Float(f) => {
                self.min_float = Some(self.min_float.map_or(*f, |m| m.min(*f)));
            }
            _ => {}
        }
    }

    fn merge(&mut self, other: &dyn Aggregator) {
        if let Some(o) = other.as_any().downcast_ref::<MinAggregator>() {
            if let Some(oi) = o.min_int {
                self.min_int = Some(self.min_int.map_or(oi, |m| m.min(oi)));
            }
            if let Some(of) = o.min_float {
                self.min_float = Some(self.min_float.map_or(of, |m| m.min(of)));
            }
        }
    }

    fn finalize(&mut self) -> Value {
        match (self.min_int, self.min_float) {
            (Some(i), None) => Value::Integer(i),
            (None, Some(f)) => Value::Float(f),
            (Some(i), Some(f)) => {
                if (i as f64) <= f {
                    Value::Integer(i)
                } else {
                    Value::Float(f)
                }
            }
            (None, None) => Value::Undefined,
        }
    }

    fn output_kind(&self, input: ValueKind) -> ValueKind {
        input
    }

    fn box_clone(&self) -> Box<dyn Aggregator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Maximum of the non-missing numeric values.
#[derive(Clone)]
pub struct MaxAggregator {
    max_int: Option<i64>,
    max_float: Option<f64>,
}

impl MaxAggregator {
    pub fn new() -> Self {
        MaxAggregator {
            max_int: None,
            max_float: None,
        }
    }
}

impl Default for MaxAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator for MaxAggregator {
    fn add(&mut self, value: &Value) {
        match value {
            Value::Integer(i) => {
                self.max_int = Some(self.max_int.map_or(*i, |m| m.max(*i)));
            }
            Value::Float(f) => {
                self.max_float = Some(self.max_float.map_or(*f, |m| m.max(*f)));
            }
            _ => {}
        }
    }

    fn merge(&mut self, other: &dyn Aggregator) {
        if let Some(o) = other.as_any().downcast_ref::<MaxAggregator>() {
            if let Some(oi) = o.max_int {
                self.max_int = Some(self.max_int.map_or(oi, |m| m.max(oi)));
            }
            if let Some(of) = o.max_float {
                self.max_float = Some(self.max_float.map_or(of, |m| m.max(of)));
            }
        }
    }

    fn finalize(&mut self) -> Value {
        match (self.max_int, self.max_float) {
            (Some(i), None) => Value::Integer(i),
            (None, Some(f)) => Value::Float(f),
            (Some(i), Some(f)) => {
                if (i as f64) >= f {
                    Value::Integer(i)
                } else {
                    Value::Float(f)
                }
            }
            (None, None) => Value::Undefined,
        }
    }

    fn output_kind(&self, input: ValueKind) -> ValueKind {
        input
    }

    fn box_clone(&self) -> Box<dyn Aggregator> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Specification for one reduced column in a grouped reduction.
#[derive(Clone)]
pub struct AggSpec {
    /// Input column index.
    pub column: usize,
    /// The aggregator prototype, cloned per group.
    pub aggregator: Box<dyn Aggregator>,
    /// Output column name.
    pub output_name: String,
}

impl AggSpec {
    pub fn new(column: usize, reduction: Reduction, output_name: &str) -> Self {
        AggSpec {
            column,
            aggregator: reduction.aggregator(),
            output_name: output_name.to_string(),
        }
    }
}
