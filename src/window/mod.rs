pub mod context;
pub mod evaluator;
pub mod fetch;
pub mod frame;
pub mod functions;
pub mod partitioning;
pub mod row_source;
pub(crate) mod scratch;

pub use context::WindowContext;
pub use evaluator::{WindowEvaluator, WindowFunctionCall, WindowPlan};
pub use fetch::{Fetched, SeekMode};
pub use frame::{FrameBound, FrameSpec, FrameUnits};
pub use functions::{
    create_window_function, get_window_function_registry, BuiltInWindowFunction, WindowFunction,
    WindowFunctionRegistry,
};
pub use row_source::{PartitionId, PartitionedBatch, PeerComparator, RowSource};
