//! Ranking window functions: ROW_NUMBER, RANK, DENSE_RANK, PERCENT_RANK and CUME_DIST.

use arrow::datatypes::DataType;
use datafusion::scalar::ScalarValue;

use crate::common::error::{Result, WindowError};
use crate::window::context::WindowContext;
use crate::window::functions::WindowFunction;

/// Tracks whether the partition's first row was already seen.
#[derive(Debug, Default, Clone, Copy)]
struct PeerTracker {
    started: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct RankState {
    rank: i64,
}

#[derive(Debug, Default, Clone, Copy)]
struct CumeDistState {
    /// Number of rows up to and including the last peer of the current row.
    peer_group_end: usize,
}

/// Returns true when the current row opens a new peer group: it is the first
/// row of the partition or not a peer of the row before it.
///
/// Moves the mark to the current row, the prior row is no longer needed once
/// it has been compared.
fn rank_advance(ctx: &mut WindowContext<'_>) -> Result<bool> {
    let pos = ctx.current_position();
    let first = {
        let tracker = ctx.partition_local_memory::<PeerTracker>()?;
        let first = !tracker.started;
        tracker.started = true;
        first
    };
    let up = if first {
        true
    } else {
        let prev = pos.checked_sub(1).ok_or_else(|| {
            WindowError::invalid_state("row 0 evaluated twice without moving the current row")
        })?;
        !ctx.rows_are_peers(prev, pos)?
    };
    ctx.set_mark_position(pos)?;
    Ok(up)
}

/// Gapped rank of the current row, `position + 1` of the first peer.
fn advance_rank(ctx: &mut WindowContext<'_>) -> Result<i64> {
    let up = rank_advance(ctx)?;
    let pos = ctx.current_position();
    let state = ctx.partition_local_memory::<RankState>()?;
    if up {
        state.rank = pos as i64 + 1;
    }
    Ok(state.rank)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RowNumber;

impl WindowFunction for RowNumber {
    fn name(&self) -> &str {
        "row_number"
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Int64)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        let pos = ctx.current_position();
        ctx.set_mark_position(pos)?;
        Ok(ScalarValue::Int64(Some(pos as i64 + 1)))
    }
}

/// Rank with gaps: peers share a rank, the next group starts at its row number.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rank;

impl WindowFunction for Rank {
    fn name(&self) -> &str {
        "rank"
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Int64)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        Ok(ScalarValue::Int64(Some(advance_rank(ctx)?)))
    }
}

/// Rank without gaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseRank;

impl WindowFunction for DenseRank {
    fn name(&self) -> &str {
        "dense_rank"
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Int64)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        let up = rank_advance(ctx)?;
        let state = ctx.partition_local_memory::<RankState>()?;
        if up {
            state.rank += 1;
        }
        Ok(ScalarValue::Int64(Some(state.rank)))
    }
}

/// `(rank - 1) / (rows - 1)`, zero for single-row partitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentRank;

impl WindowFunction for PercentRank {
    fn name(&self) -> &str {
        "percent_rank"
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Float64)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        let total = ctx.partition_row_count()?;
        let rank = advance_rank(ctx)?;
        if total <= 1 {
            return Ok(ScalarValue::Float64(Some(0.0)));
        }
        Ok(ScalarValue::Float64(Some(
            (rank - 1) as f64 / (total - 1) as f64,
        )))
    }
}

/// Fraction of partition rows preceding or peer with the current row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CumeDist;

impl WindowFunction for CumeDist {
    fn name(&self) -> &str {
        "cume_dist"
    }

    fn return_type(&self, _arg_types: &[DataType]) -> Result<DataType> {
        Ok(DataType::Float64)
    }

    fn evaluate(&self, ctx: &mut WindowContext<'_>) -> Result<ScalarValue> {
        let total = ctx.partition_row_count()?;
        let up = rank_advance(ctx)?;
        if up {
            // count the trailing peers once per peer group
            let mut end = ctx.current_position() + 1;
            while end < total && ctx.rows_are_peers(end - 1, end)? {
                end += 1;
            }
            ctx.partition_local_memory::<CumeDistState>()?.peer_group_end = end;
        }
        let end = ctx.partition_local_memory::<CumeDistState>()?.peer_group_end;
        Ok(ScalarValue::Float64(Some(end as f64 / total as f64)))
    }
}
