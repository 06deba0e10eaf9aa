use std::cmp::Ordering;

use arrow::datatypes::DataType;
use datafusion::scalar::ScalarValue;
use tracing::warn;

use crate::common::error::Result;
use crate::window::context::WindowContext;
use crate::window::fetch::{Fetched, SeekMode};
use crate::window::functions::{value_return_type, WindowFunction};

#[derive(Debug, Default)]
struct PartitionMaxState {
    computed: bool,
    max: Option<ScalarValue>,
}

/// PARTITION_MAX(value): largest non-null value of the partition, computed on
/// the first row and repeated for every other row. The frame is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionMax;

impl PartitionMax {
    fn scan(ctx: &mut WindowContext<'_>) -> Result<Option<ScalarValue>> {
        let row_count = ctx.partition_row_count()?;
        let mut max: Option<ScalarValue> = None;
        for pos in 0..row_count {
            match ctx.fetch_arg_in_partition(0, pos as i64, SeekMode::Head, false)? {
                Fetched::Value(value) => {
                    let greater = match &max {
                        None => true,
                        Some(current) => value.partial_cmp(current) == Some(Ordering::Greater),
                    };
                    if greater {
                        max = Some(value);
                    }
                }
                Fetched::Null => {}
                Fetched::OutOfRange => {
                    warn!(position = pos, row_count, "partition_max: row is outside the partition, skipping");
                }
            }
        }
        Ok(max)
    }
}

impl WindowFunction for PartitionMax {
    fn name(&self) -> &str {
        "partition_max"
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        value_return_type(self.name(), arg_types)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        if !ctx.partition_local_memory::<PartitionMaxState>()?.computed {
            let max = Self::scan(ctx)?;
            let state = ctx.partition_local_memory::<PartitionMaxState>()?;
            state.computed = true;
            state.max = max;
        }
        let state = ctx.partition_local_memory::<PartitionMaxState>()?;
        Ok(state.max.clone().unwrap_or(ScalarValue::Null))
    }
}
