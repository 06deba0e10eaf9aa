use datafusion::scalar::ScalarValue;

/// Addressing mode for argument fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Relative to the row currently being evaluated.
    Current,
    /// Relative to the first row of the partition (or frame).
    Head,
    /// Relative to the last row of the partition (or frame).
    Tail,
}

/// Outcome of fetching an argument at another row.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Value(ScalarValue),
    Null,
    /// The resolved position lies outside the partition (or frame).
    OutOfRange,
}

impl Fetched {
    pub(crate) fn from_scalar(value: ScalarValue) -> Self {
        if value.is_null() {
            Fetched::Null
        } else {
            Fetched::Value(value)
        }
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Fetched::OutOfRange)
    }

    pub fn is_null(&self) -> bool {
        !matches!(self, Fetched::Value(_))
    }

    pub fn value(&self) -> Option<&ScalarValue> {
        match self {
            Fetched::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Collapses both null and out-of-range into an untyped null.
    pub fn into_scalar(self) -> ScalarValue {
        match self {
            Fetched::Value(v) => v,
            Fetched::Null | Fetched::OutOfRange => ScalarValue::Null,
        }
    }
}
