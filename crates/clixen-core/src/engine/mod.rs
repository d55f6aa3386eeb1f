pub mod fallback;
pub mod orchestrator;
pub mod repair;
pub mod validator;

pub use fallback::FallbackTemplate;
pub use orchestrator::{
    GenerationOrchestrator, GenerationOutcome, MAX_REPAIR_ATTEMPTS, OrchestratorConfig,
};
pub use repair::RepairEngine;
pub use validator::Validator;
