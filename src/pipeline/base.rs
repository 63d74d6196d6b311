// src/pipeline/base.rs

//! Core pipeline state machine.
//!
//! A pipeline supplies three hooks: `validate`, `run` and `on_cleanup`. The
//! orchestration lives once in the provided `execute` method: status
//! transitions, timing, and the mapping of outcomes onto
//! [`PipelineStatus`]. Two distinct non-success outcomes are never
//! conflated: a validation returning `false` is an expected data outcome
//! (`ValidationFailure`, no error attached), while an error from either hook
//! is a fault (`Failure`, error captured in the result). Errors never escape
//! `execute`, so callers need no error handling to distinguish the two.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::storage::table::Table;

/// Possible states for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    #[default]
    NotStarted,
    Running,
    Success,
    Failure,
    ValidationFailure,
    /// Reserved for future cancellation support; nothing constructs it yet.
    Canceled,
}

impl PipelineStatus {
    /// Status name for metadata and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::ValidationFailure => "ValidationFailure",
            Self::Canceled => "Canceled",
        }
    }
}

/// A value flowing between pipelines: either a column table or raw JSON.
#[derive(Debug, Clone)]
pub enum PipelineData {
    Table(Table),
    Json(Value),
}

impl PipelineData {
    /// The table inside, if this is tabular data.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            Self::Json(_) => None,
        }
    }

    /// The JSON inside, if this is raw JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Table(_) => None,
        }
    }
}

impl From<Table> for PipelineData {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<Value> for PipelineData {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Execution context for a pipeline: parameters plus named input data.
///
/// A context is created fresh per invocation and never mutated by the
/// pipeline; chaining builds a new context instead.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub params: Map<String, Value>,
    pub input_data: HashMap<String, PipelineData>,
    pub start_time: DateTime<Utc>,
}

impl PipelineContext {
    /// Empty context.
    pub fn new() -> Self {
        Self {
            params: Map::new(),
            input_data: HashMap::new(),
            start_time: Utc::now(),
        }
    }

    /// Context with parameters only.
    pub fn with_params(params: Map<String, Value>) -> Self {
        Self {
            params,
            ..Self::new()
        }
    }

    /// Add a parameter, builder style.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add an input data slot, builder style.
    pub fn input(mut self, key: impl Into<String>, data: impl Into<PipelineData>) -> Self {
        self.input_data.insert(key.into(), data.into());
        self
    }

    /// Integer parameter, if present and integral.
    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(Value::as_i64)
    }

    /// String parameter, if present and a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Result of a pipeline execution. Immutable once returned.
#[derive(Debug)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub output_data: HashMap<String, PipelineData>,
    pub metadata: Map<String, Value>,
    pub error: Option<AppError>,
}

impl PipelineResult {
    /// Successful result carrying output data.
    pub fn success(output_data: HashMap<String, PipelineData>) -> Self {
        Self {
            status: PipelineStatus::Success,
            output_data,
            metadata: Map::new(),
            error: None,
        }
    }

    /// Attach metadata, builder style.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validation-failure result; an expected outcome, not a fault.
    pub fn validation_failure(message: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("validation_error".to_string(), Value::from(message.into()));
        Self {
            status: PipelineStatus::ValidationFailure,
            output_data: HashMap::new(),
            metadata,
            error: None,
        }
    }

    /// Failure result capturing the error and tagging its kind.
    pub fn failure(error: AppError) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error_type".to_string(), Value::from(error.kind()));
        metadata.insert("error_msg".to_string(), Value::from(error.to_string()));
        Self {
            status: PipelineStatus::Failure,
            output_data: HashMap::new(),
            metadata,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Success
    }
}

/// Per-instance execution state, updated exclusively by `execute`.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub status: PipelineStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub execution_time: Option<Duration>,
    pub error: Option<String>,
}

/// A unit of executable work with validate/run/cleanup hooks.
#[async_trait]
pub trait Pipeline: Send {
    /// Pipeline name for logs and monitoring events.
    fn name(&self) -> &str;

    /// Execution state, updated by `execute`.
    fn state(&self) -> &PipelineState;
    fn state_mut(&mut self) -> &mut PipelineState;

    /// Check that the context is valid for this pipeline. `Ok(false)` is the
    /// expected-failure path; an `Err` is treated as a fault.
    async fn validate(&mut self, context: &PipelineContext) -> Result<bool>;

    /// The pipeline body. Only invoked after `validate` returned true.
    async fn run(&mut self, context: &PipelineContext) -> Result<PipelineResult>;

    /// Release resources held by the pipeline. Default: nothing to release.
    async fn on_cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Execute the pipeline: validate, run, and track state and timing.
    ///
    /// Never returns an error; faults are captured in the result so callers
    /// can treat every outcome uniformly.
    async fn execute(&mut self, context: &PipelineContext) -> PipelineResult {
        self.state_mut().status = PipelineStatus::Running;
        self.state_mut().start_time = Some(Utc::now());
        log::info!("Starting execution of {}", self.name());
        let started = std::time::Instant::now();

        let result = match self.validate(context).await {
            Ok(false) => {
                log::error!("Validation failed for {}", self.name());
                self.state_mut().status = PipelineStatus::ValidationFailure;
                PipelineResult::validation_failure("Pipeline validation failed")
            }
            Ok(true) => match self.run(context).await {
                Ok(result) => {
                    self.state_mut().status = result.status;
                    log::info!(
                        "Execution of {} completed with status: {}",
                        self.name(),
                        result.status.name()
                    );
                    result
                }
                Err(error) => self.capture_failure(error),
            },
            Err(error) => self.capture_failure(error),
        };

        self.state_mut().end_time = Some(Utc::now());
        self.state_mut().execution_time = Some(started.elapsed());
        log::debug!(
            "Execution of {} took {:.2}s",
            self.name(),
            started.elapsed().as_secs_f64()
        );
        result
    }

    /// Clean up after execution. Hook errors are logged and swallowed so a
    /// cleanup failure can never mask the pipeline's actual result.
    async fn cleanup(&mut self) {
        log::debug!("Cleaning up resources for {}", self.name());
        if let Err(error) = self.on_cleanup().await {
            log::error!("Error during cleanup of {}: {}", self.name(), error);
        }
    }

    #[doc(hidden)]
    fn capture_failure(&mut self, error: AppError) -> PipelineResult {
        log::error!("Error executing {}: {}", self.name(), error);
        self.state_mut().status = PipelineStatus::Failure;
        self.state_mut().error = Some(error.to_string());
        PipelineResult::failure(error)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Configurable pipeline for framework tests.
    pub(crate) struct TestPipeline {
        pub state: PipelineState,
        pub valid: bool,
        pub validate_error: bool,
        pub run_error: bool,
        pub cleanup_error: bool,
        pub run_calls: u32,
        pub cleanup_calls: u32,
        pub output: i64,
        /// Shared run counter, for asserting across boxed instances.
        pub probe: Option<std::sync::Arc<std::sync::atomic::AtomicU32>>,
    }

    impl TestPipeline {
        pub fn new() -> Self {
            Self {
                state: PipelineState::default(),
                valid: true,
                validate_error: false,
                run_error: false,
                cleanup_error: false,
                run_calls: 0,
                cleanup_calls: 0,
                output: 1,
                probe: None,
            }
        }
    }

    #[async_trait]
    impl Pipeline for TestPipeline {
        fn name(&self) -> &str {
            "TestPipeline"
        }

        fn state(&self) -> &PipelineState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut PipelineState {
            &mut self.state
        }

        async fn validate(&mut self, _context: &PipelineContext) -> Result<bool> {
            if self.validate_error {
                return Err(AppError::validation("validate blew up"));
            }
            Ok(self.valid)
        }

        async fn run(&mut self, context: &PipelineContext) -> Result<PipelineResult> {
            self.run_calls += 1;
            if let Some(probe) = &self.probe {
                probe.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
            if self.run_error {
                return Err(AppError::invalid_argument("boom"));
            }

            // Double the piped-in value when present, otherwise emit `output`.
            let value = match context.input_data.get("data").and_then(|d| d.as_json()) {
                Some(v) => v.as_i64().unwrap_or(0) * 2,
                None => self.output,
            };
            let mut output = HashMap::new();
            output.insert("result".to_string(), PipelineData::from(Value::from(value)));
            Ok(PipelineResult::success(output))
        }

        async fn on_cleanup(&mut self) -> Result<()> {
            self.cleanup_calls += 1;
            if self.cleanup_error {
                return Err(AppError::validation("cleanup failed"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_success_path() {
        let mut pipeline = TestPipeline::new();
        let result = pipeline.execute(&PipelineContext::new()).await;

        assert_eq!(result.status, PipelineStatus::Success);
        assert_eq!(pipeline.run_calls, 1);
        assert_eq!(pipeline.state.status, PipelineStatus::Success);
        assert!(pipeline.state.end_time.is_some());
        assert!(pipeline.state.execution_time.is_some());
    }

    #[tokio::test]
    async fn test_validation_failure_skips_run() {
        let mut pipeline = TestPipeline::new();
        pipeline.valid = false;

        let result = pipeline.execute(&PipelineContext::new()).await;

        assert_eq!(result.status, PipelineStatus::ValidationFailure);
        assert!(result.error.is_none());
        assert_eq!(pipeline.run_calls, 0);
        assert_eq!(pipeline.state.status, PipelineStatus::ValidationFailure);
    }

    #[tokio::test]
    async fn test_run_error_becomes_failure() {
        let mut pipeline = TestPipeline::new();
        pipeline.run_error = true;

        let result = pipeline.execute(&PipelineContext::new()).await;

        assert_eq!(result.status, PipelineStatus::Failure);
        assert!(matches!(result.error, Some(AppError::InvalidArgument(_))));
        assert_eq!(
            result.metadata.get("error_type").and_then(Value::as_str),
            Some("InvalidArgument")
        );
        assert_eq!(pipeline.state.status, PipelineStatus::Failure);
        assert!(pipeline.state.execution_time.is_some());
    }

    #[tokio::test]
    async fn test_validate_error_becomes_failure() {
        let mut pipeline = TestPipeline::new();
        pipeline.validate_error = true;

        let result = pipeline.execute(&PipelineContext::new()).await;

        assert_eq!(result.status, PipelineStatus::Failure);
        assert_eq!(pipeline.run_calls, 0);
    }

    #[tokio::test]
    async fn test_cleanup_swallows_errors() {
        let mut pipeline = TestPipeline::new();
        pipeline.cleanup_error = true;

        pipeline.cleanup().await;
        assert_eq!(pipeline.cleanup_calls, 1);
    }

    #[test]
    fn test_context_builders() {
        let context = PipelineContext::new()
            .param("season", 2023)
            .param("mode", "full");
        assert_eq!(context.param_i64("season"), Some(2023));
        assert_eq!(context.param_str("mode"), Some("full"));
        assert_eq!(context.param_i64("missing"), None);
    }

    #[test]
    fn test_status_names() {
        assert_eq!(PipelineStatus::ValidationFailure.name(), "ValidationFailure");
        assert_eq!(PipelineStatus::Canceled.name(), "Canceled");
    }
}
