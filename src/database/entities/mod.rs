pub mod analysis_runs;
pub mod analysis_unit_results;
pub mod error_logs;
pub mod upload_sessions;
