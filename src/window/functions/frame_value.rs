//! Value functions over the current row's frame: FIRST_VALUE, LAST_VALUE and NTH_VALUE.

use arrow::datatypes::DataType;
use datafusion::scalar::ScalarValue;

use crate::common::error::{Result, WindowError};
use crate::common::scalar::scalar_to_i64;
use crate::window::context::WindowContext;
use crate::window::fetch::SeekMode;
use crate::window::functions::{value_return_type, WindowFunction};

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstValue;

impl WindowFunction for FirstValue {
    fn name(&self) -> &str {
        "first_value"
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        value_return_type(self.name(), arg_types)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        Ok(ctx
            .fetch_arg_in_frame(0, 0, SeekMode::Head, true)?
            .into_scalar())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LastValue;

impl WindowFunction for LastValue {
    fn name(&self) -> &str {
        "last_value"
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        value_return_type(self.name(), arg_types)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        Ok(ctx
            .fetch_arg_in_frame(0, 0, SeekMode::Tail, true)?
            .into_scalar())
    }
}

/// NTH_VALUE(value, n): value at the n-th (1-based) row of the frame, null when
/// the frame is shorter than n.
#[derive(Debug, Clone, Copy, Default)]
pub struct NthValue {
    const_nth: bool,
}

impl NthValue {
    pub fn new(const_nth: bool) -> Self {
        Self { const_nth }
    }
}

impl WindowFunction for NthValue {
    fn name(&self) -> &str {
        "nth_value"
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        value_return_type(self.name(), arg_types)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        let Some(nth) = scalar_to_i64(&ctx.fetch_arg_current(1)?, "argument of nth_value")? else {
            return Ok(ScalarValue::Null);
        };
        if nth <= 0 {
            return Err(WindowError::invalid_argument(
                "argument of nth_value must be greater than zero",
            ));
        }
        Ok(ctx
            .fetch_arg_in_frame(0, nth - 1, SeekMode::Head, self.const_nth)?
            .into_scalar())
    }
}
