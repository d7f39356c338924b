//! Trace module - records primitive actions for inspection and replay

pub mod tracer;

pub use tracer::{ActionType, ExecutionTrace, ExecutionTracer, TraceHandle, TraceSummary};
