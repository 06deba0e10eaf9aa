pub mod common;
pub mod config;
pub mod window;

pub use common::error::{Result, WindowError};
pub use config::WindowEngineConfig;
pub use window::{
    create_window_function, get_window_function_registry, FrameBound, FrameSpec, FrameUnits,
    Fetched, PartitionedBatch, PeerComparator, RowSource, SeekMode, WindowContext,
    WindowEvaluator, WindowFunction, WindowFunctionCall, WindowPlan,
};
