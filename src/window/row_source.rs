use std::cell::Cell;
use std::ops::Range;

use arrow::array::{Array, ArrayRef};
use arrow::compute::SortOptions;
use arrow_row::{RowConverter, Rows, SortField};
use datafusion::scalar::ScalarValue;

use crate::common::error::{Result, WindowError};

/// Identity of a partition within one row source, in delivery order.
pub type PartitionId = usize;

/// Supplies ordered rows of the current partition to window contexts.
///
/// Positions are 0-based and relative to the current partition. Methods take
/// `&self` so every context evaluating over the same input can hold a shared
/// reference; implementations keep their cursor in interior-mutable cells.
pub trait RowSource {
    /// Moves to the next partition. Returns `false` once all partitions were served.
    fn advance_partition(&self) -> bool;

    fn current_partition(&self) -> Option<PartitionId>;

    /// Row count of the current partition, `None` when no partition is active.
    fn total_rows_in_current_partition(&self) -> Option<usize>;

    /// Value of argument column `arg` at `position`.
    fn value_at(&self, position: usize, arg: usize) -> Result<ScalarValue>;

    /// Rows below `position` will not be requested again and may be dropped.
    fn release_rows_before(&self, position: usize);
}

/// Decides whether two rows of the current partition are peers under ORDER BY.
pub trait PeerComparator {
    fn are_peers(&self, a: usize, b: usize) -> bool;
}

impl<F> PeerComparator for F
where
    F: Fn(usize, usize) -> bool,
{
    fn are_peers(&self, a: usize, b: usize) -> bool {
        self(a, b)
    }
}

/// Row source and peer comparator over arrow arrays that are already sorted by
/// (partition keys, order keys).
///
/// ORDER BY keys are encoded once into the arrow row format, so a peer check is
/// a byte comparison that follows the sort options (null ordering, direction)
/// the keys were encoded with.
pub struct PartitionedBatch {
    args: Vec<ArrayRef>,
    order_keys: Option<Rows>,
    partitions: Vec<Range<usize>>,
    next_partition: Cell<usize>,
    current: Cell<Option<PartitionId>>,
    retained_from: Cell<usize>,
}

impl std::fmt::Debug for PartitionedBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedBatch")
            .field("num_args", &self.args.len())
            .field("partitions", &self.partitions)
            .field("current", &self.current.get())
            .field("retained_from", &self.retained_from.get())
            .finish()
    }
}

impl PartitionedBatch {
    pub fn try_new(
        args: Vec<ArrayRef>,
        order_keys: &[(ArrayRef, SortOptions)],
        partitions: Vec<Range<usize>>,
    ) -> Result<Self> {
        let num_rows = partitions.last().map(|r| r.end).unwrap_or(0);

        let mut expected_start = 0;
        for range in &partitions {
            if range.start != expected_start || range.end <= range.start {
                return Err(WindowError::invalid_argument(format!(
                    "partitions must be contiguous and non-empty, got {:?}",
                    partitions
                )));
            }
            expected_start = range.end;
        }
        if let Some(arg) = args.iter().find(|a| a.len() < num_rows) {
            return Err(WindowError::invalid_argument(format!(
                "argument column has {} rows, partitions cover {}",
                arg.len(),
                num_rows
            )));
        }

        let order_keys = if order_keys.is_empty() {
            None
        } else {
            let fields: Vec<SortField> = order_keys
                .iter()
                .map(|(a, options)| SortField::new_with_options(a.data_type().clone(), *options))
                .collect();
            let converter = RowConverter::new(fields)?;
            let columns: Vec<ArrayRef> = order_keys.iter().map(|(a, _)| a.clone()).collect();
            Some(converter.convert_columns(&columns)?)
        };

        Ok(Self {
            args,
            order_keys,
            partitions,
            next_partition: Cell::new(0),
            current: Cell::new(None),
            retained_from: Cell::new(0),
        })
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partitions(&self) -> &[Range<usize>] {
        &self.partitions
    }

    /// Lowest position of the current partition that is still served.
    pub fn retained_from(&self) -> usize {
        self.retained_from.get()
    }

    fn current_range(&self) -> Option<&Range<usize>> {
        self.current.get().map(|idx| &self.partitions[idx])
    }
}

impl RowSource for PartitionedBatch {
    fn advance_partition(&self) -> bool {
        let next = self.next_partition.get();
        self.retained_from.set(0);
        if next < self.partitions.len() {
            self.current.set(Some(next));
            self.next_partition.set(next + 1);
            true
        } else {
            self.current.set(None);
            false
        }
    }

    fn current_partition(&self) -> Option<PartitionId> {
        self.current.get()
    }

    fn total_rows_in_current_partition(&self) -> Option<usize> {
        self.current_range().map(|r| r.len())
    }

    fn value_at(&self, position: usize, arg: usize) -> Result<ScalarValue> {
        let range = self
            .current_range()
            .ok_or_else(|| WindowError::invalid_state("no partition is active"))?;
        if position >= range.len() {
            return Err(WindowError::OutOfRange {
                position: position as i64,
                row_count: range.len(),
            });
        }
        if position < self.retained_from.get() {
            return Err(WindowError::invalid_state(format!(
                "row {} was already released, rows are retained from {}",
                position,
                self.retained_from.get()
            )));
        }
        let array = self.args.get(arg).ok_or_else(|| {
            WindowError::invalid_argument(format!(
                "argument {} requested, only {} available",
                arg,
                self.args.len()
            ))
        })?;
        Ok(ScalarValue::try_from_array(array.as_ref(), range.start + position)?)
    }

    fn release_rows_before(&self, position: usize) {
        if position > self.retained_from.get() {
            self.retained_from.set(position);
        }
    }
}

impl PeerComparator for PartitionedBatch {
    fn are_peers(&self, a: usize, b: usize) -> bool {
        let Some(rows) = &self.order_keys else {
            // without ORDER BY every row of the partition is a peer
            return true;
        };
        let Some(range) = self.current_range() else {
            return false;
        };
        if a >= range.len() || b >= range.len() {
            return false;
        }
        rows.row(range.start + a) == rows.row(range.start + b)
    }
}
