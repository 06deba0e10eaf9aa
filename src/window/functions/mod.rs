use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::RangeInclusive;
use std::sync::Arc;

use arrow::datatypes::DataType;
use datafusion::physical_expr::expressions::Literal;
use datafusion::physical_expr::PhysicalExpr;
use datafusion::scalar::ScalarValue;

use crate::common::error::{Result, WindowError};
use crate::window::context::WindowContext;

pub mod frame_value;
pub mod lead_lag;
pub mod ntile;
pub mod partition_max;
pub mod ranking;

#[cfg(test)]
pub(crate) mod test_utils;

pub use frame_value::{FirstValue, LastValue, NthValue};
pub use lead_lag::OffsetFetch;
pub use ntile::Ntile;
pub use partition_max::PartitionMax;
pub use ranking::{CumeDist, DenseRank, PercentRank, Rank, RowNumber};

/// A window function invoked once per row, in row order, through a bound
/// [`WindowContext`].
///
/// Returning a null `ScalarValue` (typed or untyped) yields a null output; the
/// evaluator casts results to [`WindowFunction::return_type`].
pub trait WindowFunction: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType>;

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltInWindowFunction {
    RowNumber,
    Rank,
    DenseRank,
    PercentRank,
    CumeDist,
    Ntile,
    Lag,
    Lead,
    FirstValue,
    LastValue,
    NthValue,
    PartitionMax,
}

impl BuiltInWindowFunction {
    pub fn arity(&self) -> RangeInclusive<usize> {
        match self {
            BuiltInWindowFunction::RowNumber
            | BuiltInWindowFunction::Rank
            | BuiltInWindowFunction::DenseRank
            | BuiltInWindowFunction::PercentRank
            | BuiltInWindowFunction::CumeDist => 0..=0,
            BuiltInWindowFunction::Ntile
            | BuiltInWindowFunction::FirstValue
            | BuiltInWindowFunction::LastValue
            | BuiltInWindowFunction::PartitionMax => 1..=1,
            BuiltInWindowFunction::Lag | BuiltInWindowFunction::Lead => 1..=3,
            BuiltInWindowFunction::NthValue => 2..=2,
        }
    }
}

pub struct WindowFunctionRegistry {
    functions: HashMap<String, BuiltInWindowFunction>,
}

impl Default for WindowFunctionRegistry {
    fn default() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        registry.register_supported_functions();
        registry
    }
}

impl WindowFunctionRegistry {
    fn register_supported_functions(&mut self) {
        self.register("row_number", BuiltInWindowFunction::RowNumber);
        self.register("rank", BuiltInWindowFunction::Rank);
        self.register("dense_rank", BuiltInWindowFunction::DenseRank);
        self.register("percent_rank", BuiltInWindowFunction::PercentRank);
        self.register("cume_dist", BuiltInWindowFunction::CumeDist);
        self.register("ntile", BuiltInWindowFunction::Ntile);

        self.register("lag", BuiltInWindowFunction::Lag);
        self.register("lead", BuiltInWindowFunction::Lead);

        self.register("first_value", BuiltInWindowFunction::FirstValue);
        self.register("last_value", BuiltInWindowFunction::LastValue);
        self.register("nth_value", BuiltInWindowFunction::NthValue);

        self.register("partition_max", BuiltInWindowFunction::PartitionMax);
    }

    fn register(&mut self, name: &str, function: BuiltInWindowFunction) {
        self.functions.insert(name.to_lowercase(), function);
    }

    pub fn get(&self, name: &str) -> Option<BuiltInWindowFunction> {
        self.functions.get(&name.to_lowercase()).copied()
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    pub fn supported_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

pub fn get_window_function_registry() -> &'static WindowFunctionRegistry {
    static REGISTRY: std::sync::OnceLock<WindowFunctionRegistry> = std::sync::OnceLock::new();
    REGISTRY.get_or_init(WindowFunctionRegistry::default)
}

/// An argument is constant across the partition when it is a literal.
fn is_constant(expr: &Arc<dyn PhysicalExpr>) -> bool {
    expr.as_any().downcast_ref::<Literal>().is_some()
}

/// Builds the window function `name` for the given argument expressions.
pub fn create_window_function(
    name: &str,
    args: &[Arc<dyn PhysicalExpr>],
) -> Result<Arc<dyn WindowFunction>> {
    let kind = get_window_function_registry()
        .get(name)
        .ok_or_else(|| WindowError::invalid_argument(format!("unknown window function: {name}")))?;
    if !kind.arity().contains(&args.len()) {
        return Err(WindowError::invalid_argument(format!(
            "{} expects {} to {} arguments, got {}",
            name,
            kind.arity().start(),
            kind.arity().end(),
            args.len()
        )));
    }

    let function: Arc<dyn WindowFunction> = match kind {
        BuiltInWindowFunction::RowNumber => Arc::new(RowNumber),
        BuiltInWindowFunction::Rank => Arc::new(Rank),
        BuiltInWindowFunction::DenseRank => Arc::new(DenseRank),
        BuiltInWindowFunction::PercentRank => Arc::new(PercentRank),
        BuiltInWindowFunction::CumeDist => Arc::new(CumeDist),
        BuiltInWindowFunction::Ntile => Arc::new(Ntile),
        BuiltInWindowFunction::Lag | BuiltInWindowFunction::Lead => {
            let forward = kind == BuiltInWindowFunction::Lead;
            let const_offset = args.get(1).map_or(true, is_constant);
            Arc::new(match (forward, args.len()) {
                (false, 1) => OffsetFetch::lag(),
                (false, 2) => OffsetFetch::lag_with_offset(const_offset),
                (false, _) => OffsetFetch::lag_with_offset_and_default(const_offset),
                (true, 1) => OffsetFetch::lead(),
                (true, 2) => OffsetFetch::lead_with_offset(const_offset),
                (true, _) => OffsetFetch::lead_with_offset_and_default(const_offset),
            })
        }
        BuiltInWindowFunction::FirstValue => Arc::new(FirstValue),
        BuiltInWindowFunction::LastValue => Arc::new(LastValue),
        BuiltInWindowFunction::NthValue => Arc::new(NthValue::new(is_constant(&args[1]))),
        BuiltInWindowFunction::PartitionMax => Arc::new(PartitionMax),
    };
    Ok(function)
}

pub(crate) fn value_return_type(name: &str, arg_types: &[DataType]) -> Result<DataType> {
    arg_types
        .first()
        .cloned()
        .ok_or_else(|| WindowError::invalid_argument(format!("{name} requires a value argument")))
}
