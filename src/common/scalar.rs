use arrow::datatypes::DataType;
use datafusion::scalar::ScalarValue;

use crate::common::error::{Result, WindowError};

/// Reads an integer argument. Nulls map to `None`, non-integer types are rejected.
pub fn scalar_to_i64(value: &ScalarValue, what: &str) -> Result<Option<i64>> {
    if value.is_null() {
        return Ok(None);
    }
    let v = match value {
        ScalarValue::Int8(Some(v)) => *v as i64,
        ScalarValue::Int16(Some(v)) => *v as i64,
        ScalarValue::Int32(Some(v)) => *v as i64,
        ScalarValue::Int64(Some(v)) => *v,
        ScalarValue::UInt8(Some(v)) => *v as i64,
        ScalarValue::UInt16(Some(v)) => *v as i64,
        ScalarValue::UInt32(Some(v)) => *v as i64,
        ScalarValue::UInt64(Some(v)) => i64::try_from(*v).map_err(|_| {
            WindowError::invalid_argument(format!("{what} {v} does not fit into a 64-bit integer"))
        })?,
        other => {
            return Err(WindowError::invalid_argument(format!(
                "{what} must be an integer, got {}",
                other.data_type()
            )))
        }
    };
    Ok(Some(v))
}

/// Null of the given type, falling back to the untyped null for types datafusion
/// cannot build a null scalar for.
pub fn typed_null(data_type: &DataType) -> ScalarValue {
    ScalarValue::try_from(data_type).unwrap_or(ScalarValue::Null)
}
