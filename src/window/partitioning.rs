//! Sorting and splitting input columns into window partitions.

use std::ops::Range;

use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::compute::kernels::partition::partition;
use arrow::compute::{self, SortOptions};
use arrow_row::{RowConverter, SortField};

use crate::common::error::Result;

/// Stable lexicographic sort over (partition keys ascending, order keys with
/// their options) using the arrow row format. `None` when there is nothing to
/// sort by.
pub(crate) fn lexsort_indices(
    partition_keys: &[ArrayRef],
    order_keys: &[(ArrayRef, SortOptions)],
) -> Result<Option<UInt32Array>> {
    if partition_keys.is_empty() && order_keys.is_empty() {
        return Ok(None);
    }

    let mut fields = Vec::with_capacity(partition_keys.len() + order_keys.len());
    let mut arrays = Vec::with_capacity(partition_keys.len() + order_keys.len());
    for key in partition_keys {
        fields.push(SortField::new(key.data_type().clone()));
        arrays.push(key.clone());
    }
    for (key, options) in order_keys {
        fields.push(SortField::new_with_options(key.data_type().clone(), *options));
        arrays.push(key.clone());
    }

    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(&arrays)?;

    // sort_by is stable, rows with equal keys keep their input order
    let mut indices: Vec<_> = rows.iter().enumerate().collect();
    indices.sort_by(|(_, a), (_, b)| a.cmp(b));

    Ok(Some(UInt32Array::from_iter_values(
        indices.iter().map(|(i, _)| *i as u32),
    )))
}

pub(crate) fn take_all(columns: &[ArrayRef], indices: &UInt32Array) -> Result<Vec<ArrayRef>> {
    columns
        .iter()
        .map(|column| Ok(compute::take(column.as_ref(), indices, None)?))
        .collect()
}

/// Ranges of consecutive rows with equal partition keys. Without partition
/// keys the whole input is one partition; empty input has none.
pub(crate) fn partition_ranges(
    partition_keys: &[ArrayRef],
    num_rows: usize,
) -> Result<Vec<Range<usize>>> {
    if num_rows == 0 {
        return Ok(Vec::new());
    }
    if partition_keys.is_empty() {
        return Ok(vec![0..num_rows]);
    }
    Ok(partition(partition_keys)?.ranges())
}
