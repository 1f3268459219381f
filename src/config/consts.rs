/// Number of sources when a workflow does not say otherwise
pub const DEFAULT_SOURCE_NUMBER: u32 = 1;
/// Workflow name used when the file has none
pub const DEFAULT_WORKFLOW_NAME: &str = "workflow";
/// Concurrency used when available parallelism cannot be detected
pub const FALLBACK_CONCURRENCY: usize = 4;
/// Pause between submission attempts while the engine applies back-pressure
pub const BACKPRESSURE_RETRY_MS: u64 = 10;
