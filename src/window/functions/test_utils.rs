use std::ops::Range;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::compute::SortOptions;
use datafusion::scalar::ScalarValue;

use crate::common::error::Result;
use crate::window::context::WindowContext;
use crate::window::frame::FrameSpec;
use crate::window::functions::WindowFunction;
use crate::window::row_source::{PartitionedBatch, RowSource};

pub(crate) fn int_array(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub(crate) fn nullable_int_array(values: &[Option<i64>]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub(crate) fn string_array(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

/// Constant argument column.
pub(crate) fn repeat_int(value: Option<i64>, len: usize) -> ArrayRef {
    Arc::new(Int64Array::from(vec![value; len]))
}

/// Drives `function` over every row of every partition the way the evaluator
/// does and returns the raw per-row results.
pub(crate) fn run_function(
    function: &dyn WindowFunction,
    args: Vec<ArrayRef>,
    order_key: Option<ArrayRef>,
    partitions: Vec<Range<usize>>,
    frame: FrameSpec,
) -> Result<Vec<ScalarValue>> {
    let order_keys: Vec<(ArrayRef, SortOptions)> = order_key
        .into_iter()
        .map(|k| (k, SortOptions::default()))
        .collect();
    let num_args = args.len();
    let source = PartitionedBatch::try_new(args, &order_keys, partitions)?;
    let mut ctx = WindowContext::new(&source, &source, (0..num_args).collect(), frame);

    let mut out = Vec::new();
    while source.advance_partition() {
        ctx.bind_partition()?;
        for pos in 0..ctx.partition_row_count()? {
            ctx.set_current_position(pos)?;
            out.push(function.evaluate(&mut ctx)?);
            assert!(ctx.mark_position() <= ctx.current_position());
        }
    }
    Ok(out)
}

/// Single partition ordered by `keys`.
pub(crate) fn run_ordered(
    function: &dyn WindowFunction,
    keys: &[i64],
    mut extra_args: Vec<ArrayRef>,
) -> Result<Vec<ScalarValue>> {
    let keys = int_array(keys);
    let mut args = vec![keys.clone()];
    args.append(&mut extra_args);
    let len = keys.len();
    run_function(
        function,
        args,
        Some(keys),
        vec![0..len],
        FrameSpec::default_for(true),
    )
}

pub(crate) fn assert_i64s(values: &[ScalarValue], expected: &[i64]) {
    assert_eq!(values.len(), expected.len());
    for (i, (v, e)) in values.iter().zip(expected.iter()).enumerate() {
        assert_eq!(v, &ScalarValue::Int64(Some(*e)), "mismatch at {i}");
    }
}

pub(crate) fn assert_f64s(values: &[ScalarValue], expected: &[f64]) {
    assert_eq!(values.len(), expected.len());
    for (i, (v, e)) in values.iter().zip(expected.iter()).enumerate() {
        let ScalarValue::Float64(Some(got)) = v else {
            panic!("expected Float64 at {i}, got {v:?}");
        };
        assert!((got - e).abs() < 1e-9, "mismatch at {i}: got={got} expected={e}");
    }
}
