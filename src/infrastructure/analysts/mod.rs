pub mod llm;
pub mod scripted;

pub use llm::{LlmAnalystPanel, LlmBackendConfig};
pub use scripted::ScriptedAnalystPanel;
