use std::ops::Range;

use datafusion::scalar::ScalarValue;
use tracing::{debug, trace};

use crate::common::error::{Result, WindowError};
use crate::window::fetch::{Fetched, SeekMode};
use crate::window::frame::FrameSpec;
use crate::window::row_source::{PartitionId, PeerComparator, RowSource};
use crate::window::scratch::PartitionScratch;

#[derive(Debug, Clone, Copy)]
struct PartitionBinding {
    id: PartitionId,
    row_count: usize,
}

/// Evaluation state of one window function instance over the current partition.
///
/// The context owns the mark position and the partition-local scratch memory of
/// its function; the row source and peer comparator are shared with the other
/// contexts evaluating over the same input.
pub struct WindowContext<'a> {
    source: &'a dyn RowSource,
    peers: &'a dyn PeerComparator,
    /// Function argument index -> row source argument column.
    arg_columns: Vec<usize>,
    frame_spec: FrameSpec,
    partition: Option<PartitionBinding>,
    current: usize,
    positioned: bool,
    mark: usize,
    frame: Option<Range<usize>>,
    peer_group: Option<Range<usize>>,
    scratch: PartitionScratch,
}

impl<'a> WindowContext<'a> {
    pub fn new(
        source: &'a dyn RowSource,
        peers: &'a dyn PeerComparator,
        arg_columns: Vec<usize>,
        frame_spec: FrameSpec,
    ) -> Self {
        Self {
            source,
            peers,
            arg_columns,
            frame_spec,
            partition: None,
            current: 0,
            positioned: false,
            mark: 0,
            frame: None,
            peer_group: None,
            scratch: PartitionScratch::default(),
        }
    }

    /// Binds the context to the partition the row source currently serves.
    /// Resets the mark and hands out fresh scratch memory.
    pub fn bind_partition(&mut self) -> Result<()> {
        let (Some(id), Some(row_count)) = (
            self.source.current_partition(),
            self.source.total_rows_in_current_partition(),
        ) else {
            return Err(WindowError::invalid_state(
                "row source has no active partition to bind",
            ));
        };
        debug!(partition = id, row_count, "binding window context");
        self.partition = Some(PartitionBinding { id, row_count });
        self.current = 0;
        self.positioned = false;
        self.mark = 0;
        self.frame = None;
        self.peer_group = None;
        self.scratch.rebind(id);
        Ok(())
    }

    pub fn unbind(&mut self) {
        self.partition = None;
        self.positioned = false;
        self.frame = None;
        self.peer_group = None;
        self.scratch.clear();
    }

    pub fn is_bound(&self) -> bool {
        self.partition.is_some()
    }

    pub fn frame_spec(&self) -> &FrameSpec {
        &self.frame_spec
    }

    pub fn num_args(&self) -> usize {
        self.arg_columns.len()
    }

    fn binding(&self) -> Result<PartitionBinding> {
        self.partition
            .ok_or_else(|| WindowError::invalid_state("window context is not bound to a partition"))
    }

    /// Moves evaluation to row `position`. Rows must be visited in strictly
    /// ascending order within a partition.
    pub fn set_current_position(&mut self, position: usize) -> Result<()> {
        let binding = self.binding()?;
        if position >= binding.row_count {
            return Err(WindowError::OutOfRange {
                position: position as i64,
                row_count: binding.row_count,
            });
        }
        if self.positioned && position <= self.current {
            return Err(WindowError::invalid_state(format!(
                "rows must be evaluated in ascending order, {} after {}",
                position, self.current
            )));
        }
        self.current = position;
        self.positioned = true;
        self.frame = None;
        Ok(())
    }

    pub fn current_position(&self) -> usize {
        self.current
    }

    pub fn partition_row_count(&self) -> Result<usize> {
        Ok(self.binding()?.row_count)
    }

    pub fn mark_position(&self) -> usize {
        self.mark
    }

    /// Promises that rows below `position` will not be requested again.
    pub fn set_mark_position(&mut self, position: usize) -> Result<()> {
        self.binding()?;
        if position < self.mark {
            return Err(WindowError::invalid_argument(format!(
                "cannot move mark backward from {} to {}",
                self.mark, position
            )));
        }
        if position > self.current {
            return Err(WindowError::invalid_argument(format!(
                "cannot move mark to {} past the current row {}",
                position, self.current
            )));
        }
        if position != self.mark {
            trace!(from = self.mark, to = position, "advancing mark");
            self.mark = position;
        }
        Ok(())
    }

    pub fn rows_are_peers(&self, a: usize, b: usize) -> Result<bool> {
        let binding = self.binding()?;
        for position in [a, b] {
            if position >= binding.row_count {
                return Err(WindowError::OutOfRange {
                    position: position as i64,
                    row_count: binding.row_count,
                });
            }
        }
        if a == b {
            return Ok(true);
        }
        Ok(self.peers.are_peers(a, b))
    }

    /// Evaluates argument `arg` at a row addressed relative to the partition.
    ///
    /// A position outside the partition yields [`Fetched::OutOfRange`]; callers
    /// decide whether that is expected. With `advance_mark` the mark follows the
    /// resolved row, never past the current row.
    pub fn fetch_arg_in_partition(
        &mut self,
        arg: usize,
        relative: i64,
        seek: SeekMode,
        advance_mark: bool,
    ) -> Result<Fetched> {
        let binding = self.binding()?;
        let base = match seek {
            SeekMode::Current => self.current as i64,
            SeekMode::Head => 0,
            SeekMode::Tail => binding.row_count as i64 - 1,
        };
        let Some(absolute) = base.checked_add(relative) else {
            return Ok(Fetched::OutOfRange);
        };
        if absolute < 0 || absolute >= binding.row_count as i64 {
            return Ok(Fetched::OutOfRange);
        }
        self.fetch_at(arg, absolute as usize, advance_mark)
    }

    /// Same as [`Self::fetch_arg_in_partition`], bounded by the current row's frame.
    pub fn fetch_arg_in_frame(
        &mut self,
        arg: usize,
        relative: i64,
        seek: SeekMode,
        advance_mark: bool,
    ) -> Result<Fetched> {
        let frame = self.frame()?;
        if frame.is_empty() {
            return Ok(Fetched::OutOfRange);
        }
        let base = match seek {
            SeekMode::Current => self.current as i64,
            SeekMode::Head => frame.start as i64,
            SeekMode::Tail => frame.end as i64 - 1,
        };
        let Some(absolute) = base.checked_add(relative) else {
            return Ok(Fetched::OutOfRange);
        };
        if absolute < frame.start as i64 || absolute >= frame.end as i64 {
            return Ok(Fetched::OutOfRange);
        }
        self.fetch_at(arg, absolute as usize, advance_mark)
    }

    pub fn fetch_arg_current(&self, arg: usize) -> Result<ScalarValue> {
        self.binding()?;
        if !self.positioned {
            return Err(WindowError::invalid_state("no current row"));
        }
        self.source.value_at(self.current, self.arg_column(arg)?)
    }

    fn fetch_at(&mut self, arg: usize, position: usize, advance_mark: bool) -> Result<Fetched> {
        if position < self.mark {
            return Err(WindowError::invalid_state(format!(
                "row {} is below the mark {}",
                position, self.mark
            )));
        }
        let column = self.arg_column(arg)?;
        if advance_mark {
            let target = position.min(self.current);
            if target > self.mark {
                self.set_mark_position(target)?;
            }
        }
        Ok(Fetched::from_scalar(self.source.value_at(position, column)?))
    }

    fn arg_column(&self, arg: usize) -> Result<usize> {
        self.arg_columns.get(arg).copied().ok_or_else(|| {
            WindowError::invalid_argument(format!(
                "argument {} requested, function has {}",
                arg,
                self.arg_columns.len()
            ))
        })
    }

    /// Scratch memory of this function for the current partition, zero
    /// (`Default`) initialized on first access after a partition change.
    pub fn partition_local_memory<S: Default + 'static>(&mut self) -> Result<&mut S> {
        self.binding()?;
        Ok(self.scratch.get_or_default::<S>())
    }

    /// Frame of the current row as a half-open range of partition positions.
    pub fn frame(&mut self) -> Result<Range<usize>> {
        if let Some(frame) = &self.frame {
            return Ok(frame.clone());
        }
        let binding = self.binding()?;
        if !self.positioned {
            return Err(WindowError::invalid_state("no current row"));
        }
        let peer_group = if self.frame_spec.needs_peer_group() {
            Some(self.peer_group_of_current(binding.row_count))
        } else {
            None
        };
        let frame = self
            .frame_spec
            .resolve(self.current, binding.row_count, peer_group);
        self.frame = Some(frame.clone());
        Ok(frame)
    }

    fn peer_group_of_current(&mut self, row_count: usize) -> Range<usize> {
        let current = self.current;
        if let Some(group) = &self.peer_group {
            if group.contains(&current) {
                return group.clone();
            }
        }
        let start = match &self.peer_group {
            Some(group) if group.end == current => current,
            _ => {
                let mut start = current;
                while start > 0 && self.peers.are_peers(start - 1, start) {
                    start -= 1;
                }
                start
            }
        };
        let mut end = current + 1;
        while end < row_count && self.peers.are_peers(end - 1, end) {
            end += 1;
        }
        self.peer_group = Some(start..end);
        start..end
    }
}
