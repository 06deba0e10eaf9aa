use arrow::datatypes::DataType;
use datafusion::scalar::ScalarValue;

use crate::common::error::Result;
use crate::common::scalar::scalar_to_i64;
use crate::window::context::WindowContext;
use crate::window::fetch::{Fetched, SeekMode};
use crate::window::functions::{value_return_type, WindowFunction};

/// LEAD and LAG: the value argument evaluated `offset` rows after (lead) or
/// before (lag) the current row within the partition.
///
/// Arguments are `(value [, offset [, default]])`. A null offset gives null, a
/// row outside the partition gives the default (evaluated at the current row)
/// or null when there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetFetch {
    forward: bool,
    has_offset: bool,
    has_default: bool,
    /// The offset is the same for every row, so the mark may follow the fetched row.
    const_offset: bool,
}

impl OffsetFetch {
    pub fn new(forward: bool, has_offset: bool, has_default: bool, const_offset: bool) -> Self {
        Self {
            forward,
            has_offset,
            has_default,
            const_offset: const_offset || !has_offset,
        }
    }

    pub fn lag() -> Self {
        Self::new(false, false, false, true)
    }

    pub fn lag_with_offset(const_offset: bool) -> Self {
        Self::new(false, true, false, const_offset)
    }

    pub fn lag_with_offset_and_default(const_offset: bool) -> Self {
        Self::new(false, true, true, const_offset)
    }

    pub fn lead() -> Self {
        Self::new(true, false, false, true)
    }

    pub fn lead_with_offset(const_offset: bool) -> Self {
        Self::new(true, true, false, const_offset)
    }

    pub fn lead_with_offset_and_default(const_offset: bool) -> Self {
        Self::new(true, true, true, const_offset)
    }
}

impl WindowFunction for OffsetFetch {
    fn name(&self) -> &str {
        match (self.forward, self.has_offset, self.has_default) {
            (false, false, _) => "lag",
            (false, true, false) => "lag_with_offset",
            (false, true, true) => "lag_with_offset_and_default",
            (true, false, _) => "lead",
            (true, true, false) => "lead_with_offset",
            (true, true, true) => "lead_with_offset_and_default",
        }
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        value_return_type(self.name(), arg_types)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        let offset = if self.has_offset {
            match scalar_to_i64(&ctx.fetch_arg_current(1)?, "offset")? {
                Some(offset) => offset,
                None => return Ok(ScalarValue::Null),
            }
        } else {
            1
        };
        let relative = if self.forward {
            offset
        } else {
            // -i64::MIN lies past any partition end, as does i64::MAX
            offset.checked_neg().unwrap_or(i64::MAX)
        };

        let fetched =
            ctx.fetch_arg_in_partition(0, relative, SeekMode::Current, self.const_offset)?;
        match fetched {
            Fetched::OutOfRange if self.has_default => ctx.fetch_arg_current(2),
            other => Ok(other.into_scalar()),
        }
    }
}
