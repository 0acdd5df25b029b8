pub mod cost_manager;
pub mod execution;
pub mod orchestrator;
pub mod risk_gate;

pub use cost_manager::{AnalysisDepth, CostLimits, CostManager, SignalPriority};
pub use execution::{ExecutionConfig, ExecutionPipeline};
pub use orchestrator::CouncilOrchestrator;
