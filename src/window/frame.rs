use std::ops::Range;

use datafusion::logical_expr::{WindowFrame, WindowFrameBound, WindowFrameUnits};
use datafusion::scalar::ScalarValue;

use crate::common::error::{Result, WindowError};
use crate::common::scalar::scalar_to_i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnits {
    /// Physical row offsets.
    Rows,
    /// Peer-group addressing: CURRENT ROW covers the whole peer group. Numeric
    /// offsets are not supported.
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

impl FrameBound {
    fn has_offset(&self) -> bool {
        matches!(self, FrameBound::Preceding(_) | FrameBound::Following(_))
    }
}

/// Frame clause of a window definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub units: FrameUnits,
    pub start: FrameBound,
    pub end: FrameBound,
}

impl FrameSpec {
    pub fn new(units: FrameUnits, start: FrameBound, end: FrameBound) -> Result<Self> {
        if start == FrameBound::UnboundedFollowing {
            return Err(WindowError::invalid_argument(
                "frame start cannot be UNBOUNDED FOLLOWING",
            ));
        }
        if end == FrameBound::UnboundedPreceding {
            return Err(WindowError::invalid_argument(
                "frame end cannot be UNBOUNDED PRECEDING",
            ));
        }
        if units == FrameUnits::Range && (start.has_offset() || end.has_offset()) {
            return Err(WindowError::invalid_argument(
                "RANGE frames with offset bounds are not supported",
            ));
        }
        Ok(Self { units, start, end })
    }

    pub fn rows(start: FrameBound, end: FrameBound) -> Result<Self> {
        Self::new(FrameUnits::Rows, start, end)
    }

    /// `ROWS BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING`.
    pub fn whole_partition() -> Self {
        Self {
            units: FrameUnits::Rows,
            start: FrameBound::UnboundedPreceding,
            end: FrameBound::UnboundedFollowing,
        }
    }

    /// SQL default frame: up to the last peer of the current row when the window
    /// is ordered, the whole partition otherwise.
    pub fn default_for(has_order_by: bool) -> Self {
        if has_order_by {
            Self {
                units: FrameUnits::Range,
                start: FrameBound::UnboundedPreceding,
                end: FrameBound::CurrentRow,
            }
        } else {
            Self::whole_partition()
        }
    }

    pub(crate) fn needs_peer_group(&self) -> bool {
        self.units == FrameUnits::Range
            && (self.start == FrameBound::CurrentRow || self.end == FrameBound::CurrentRow)
    }

    /// Resolves the frame of `current` as a half-open range of partition
    /// positions. `peer_group` must be given when [`Self::needs_peer_group`] is true.
    pub(crate) fn resolve(
        &self,
        current: usize,
        row_count: usize,
        peer_group: Option<Range<usize>>,
    ) -> Range<usize> {
        let peer_group = peer_group.unwrap_or(current..current + 1);
        let start = match self.start {
            FrameBound::UnboundedPreceding => 0,
            FrameBound::Preceding(n) => current.saturating_sub(n as usize),
            FrameBound::CurrentRow if self.units == FrameUnits::Range => peer_group.start,
            FrameBound::CurrentRow => current,
            FrameBound::Following(n) => current.saturating_add(n as usize),
            FrameBound::UnboundedFollowing => row_count,
        };
        let end = match self.end {
            FrameBound::UnboundedPreceding => 0,
            FrameBound::Preceding(n) => (current + 1).saturating_sub(n as usize),
            FrameBound::CurrentRow if self.units == FrameUnits::Range => peer_group.end,
            FrameBound::CurrentRow => current + 1,
            FrameBound::Following(n) => current.saturating_add(n as usize).saturating_add(1),
            FrameBound::UnboundedFollowing => row_count,
        };
        let start = start.min(row_count);
        let end = end.min(row_count).max(start);
        start..end
    }
}

impl TryFrom<&WindowFrame> for FrameSpec {
    type Error = WindowError;

    fn try_from(frame: &WindowFrame) -> Result<Self> {
        let units = match frame.units {
            WindowFrameUnits::Rows => FrameUnits::Rows,
            WindowFrameUnits::Range => FrameUnits::Range,
            WindowFrameUnits::Groups => {
                return Err(WindowError::invalid_argument("GROUPS frames are not supported"))
            }
        };
        let start = convert_bound(&frame.start_bound)?;
        let end = convert_bound(&frame.end_bound)?;
        FrameSpec::new(units, start, end)
    }
}

fn convert_bound(bound: &WindowFrameBound) -> Result<FrameBound> {
    match bound {
        WindowFrameBound::Preceding(v) if v.is_null() => Ok(FrameBound::UnboundedPreceding),
        WindowFrameBound::Preceding(v) => Ok(FrameBound::Preceding(frame_offset(v)?)),
        WindowFrameBound::CurrentRow => Ok(FrameBound::CurrentRow),
        WindowFrameBound::Following(v) if v.is_null() => Ok(FrameBound::UnboundedFollowing),
        WindowFrameBound::Following(v) => Ok(FrameBound::Following(frame_offset(v)?)),
    }
}

fn frame_offset(value: &ScalarValue) -> Result<u64> {
    match scalar_to_i64(value, "frame offset")? {
        Some(n) if n >= 0 => Ok(n as u64),
        _ => Err(WindowError::invalid_argument(format!(
            "frame offset must be a non-negative integer, got {value}"
        ))),
    }
}
