pub mod extraction;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod run;
pub mod stage;
pub mod worker;

pub use pipeline::{AnalysisJob, AnalysisOrchestrator, OrchestratorDeps};
pub use progress::{DefaultProgressReporter, ProgressReporter};
pub use run::RunRecorder;
pub use stage::{RunStage, UnitOutcome};
pub use worker::{AnalysisQueue, AnalysisWorker};
