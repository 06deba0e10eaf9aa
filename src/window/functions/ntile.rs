use arrow::datatypes::DataType;
use datafusion::scalar::ScalarValue;

use crate::common::error::{Result, WindowError};
use crate::common::scalar::scalar_to_i64;
use crate::window::context::WindowContext;
use crate::window::functions::WindowFunction;

#[derive(Debug, Default, Clone, Copy)]
struct NtileState {
    initialized: bool,
    /// The bucket count was null on the first row, every row is null.
    null_buckets: bool,
    bucket: i64,
    rows_in_bucket: i64,
    /// Rows the current bucket holds.
    capacity: i64,
    /// Number of leading buckets that hold one extra row, zeroed once they are filled.
    remainder: i64,
}

impl NtileState {
    fn new(total_rows: i64, buckets: i64) -> Self {
        let mut state = Self {
            initialized: true,
            null_buckets: false,
            bucket: 1,
            rows_in_bucket: 0,
            capacity: total_rows / buckets,
            remainder: 0,
        };
        if state.capacity <= 0 {
            state.capacity = 1;
        } else {
            state.remainder = total_rows % buckets;
            if state.remainder != 0 {
                state.capacity += 1;
            }
        }
        state
    }

    fn advance(&mut self) -> i64 {
        self.rows_in_bucket += 1;
        if self.rows_in_bucket > self.capacity {
            if self.remainder != 0 && self.bucket == self.remainder {
                self.remainder = 0;
                self.capacity -= 1;
            }
            self.bucket += 1;
            self.rows_in_bucket = 1;
        }
        self.bucket
    }
}

/// NTILE(n): splits the partition into `n` buckets whose sizes differ by at
/// most one, larger buckets first.
///
/// The bucket count is read from the first row of the partition and must stay
/// the same for the rest of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ntile;

impl WindowFunction for Ntile {
    fn name(&self) -> &str {
        "ntile"
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Int64)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        let mut state = *ctx.partition_local_memory::<NtileState>()?;
        if state.null_buckets {
            return Ok(ScalarValue::Int64(None));
        }
        if !state.initialized {
            let total = ctx.partition_row_count()? as i64;
            let buckets = scalar_to_i64(&ctx.fetch_arg_current(0)?, "ntile bucket count")?;
            match buckets {
                None => {
                    ctx.partition_local_memory::<NtileState>()?.null_buckets = true;
                    return Ok(ScalarValue::Int64(None));
                }
                Some(n) if n <= 0 => {
                    return Err(WindowError::invalid_argument(
                        "argument of ntile must be greater than zero",
                    ));
                }
                Some(n) => state = NtileState::new(total, n),
            }
        }
        let bucket = state.advance();
        *ctx.partition_local_memory::<NtileState>()? = state;
        Ok(ScalarValue::Int64(Some(bucket)))
    }
}
