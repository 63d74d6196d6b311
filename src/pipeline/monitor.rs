// src/pipeline/monitor.rs

//! Event-based monitoring for pipeline execution.
//!
//! Observers register on a [`MonitorRegistry`] handle that is passed
//! explicitly to whoever needs it; there is no process-wide registry, so
//! tests get isolation by constructing their own. A
//! [`MonitoredPipeline`] wraps any pipeline and emits lifecycle events
//! around the delegated `execute` call: `pipeline_start` before validation,
//! exactly one of `pipeline_success`/`pipeline_error` after completion, and
//! always `pipeline_end` with the elapsed milliseconds. `execute` cannot
//! leak errors past the pipeline boundary, so the end event fires on every
//! path.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::{Map, Value};

use crate::error::Result;

use super::base::{Pipeline, PipelineContext, PipelineResult, PipelineState, PipelineStatus};

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PipelineStart,
    PipelineSuccess,
    PipelineError,
    PipelineEnd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineStart => "pipeline_start",
            Self::PipelineSuccess => "pipeline_success",
            Self::PipelineError => "pipeline_error",
            Self::PipelineEnd => "pipeline_end",
        }
    }
}

/// A monitoring event emitted around pipeline execution.
#[derive(Debug, Clone)]
pub struct MonitoringEvent {
    pub kind: EventKind,
    pub pipeline_name: String,
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl MonitoringEvent {
    pub fn new(kind: EventKind, pipeline_name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            kind,
            pipeline_name: pipeline_name.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Receives pipeline events.
#[async_trait]
pub trait Monitor: Send + Sync {
    async fn record_event(&self, event: &MonitoringEvent);
}

/// An explicit, context-scoped list of observers.
#[derive(Default)]
pub struct MonitorRegistry {
    monitors: RwLock<Vec<Arc<dyn Monitor>>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for subsequent broadcasts.
    pub fn register(&self, monitor: Arc<dyn Monitor>) {
        self.monitors
            .write()
            .expect("monitor registry lock")
            .push(monitor);
        log::debug!("Registered monitor");
    }

    /// Remove all observers. Callers sharing a registry across runs reset it
    /// between uses to avoid cross-run leakage.
    pub fn clear(&self) {
        self.monitors.write().expect("monitor registry lock").clear();
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.monitors.read().expect("monitor registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch an event to every observer concurrently, awaiting them all.
    pub async fn broadcast(&self, event: MonitoringEvent) {
        let monitors: Vec<Arc<dyn Monitor>> = self
            .monitors
            .read()
            .expect("monitor registry lock")
            .clone();
        join_all(monitors.iter().map(|m| m.record_event(&event))).await;
    }
}

/// Monitor that logs events; useful for development and debugging.
pub struct ConsoleMonitor;

#[async_trait]
impl Monitor for ConsoleMonitor {
    async fn record_event(&self, event: &MonitoringEvent) {
        log::info!(
            "Pipeline event: {} | {} | {} | {}",
            event.kind.as_str(),
            event.pipeline_name,
            event.timestamp.to_rfc3339(),
            Value::Object(event.data.clone())
        );
    }
}

/// Wraps a pipeline with lifecycle event emission.
pub struct MonitoredPipeline<P: Pipeline> {
    inner: P,
    registry: Arc<MonitorRegistry>,
}

impl<P: Pipeline> MonitoredPipeline<P> {
    pub fn new(inner: P, registry: Arc<MonitorRegistry>) -> Self {
        Self { inner, registry }
    }

    /// The wrapped pipeline.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn error_data(result: &PipelineResult) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("status".to_string(), result.status.name().into());
        let error_type = if result.status == PipelineStatus::ValidationFailure {
            "ValidationFailure".to_string()
        } else {
            result
                .metadata
                .get("error_type")
                .and_then(Value::as_str)
                .unwrap_or("ExecutionFailure")
                .to_string()
        };
        data.insert("error_type".to_string(), error_type.into());
        data.insert("metadata".to_string(), Value::Object(result.metadata.clone()));
        data
    }
}

#[async_trait]
impl<P: Pipeline> Pipeline for MonitoredPipeline<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn state(&self) -> &PipelineState {
        self.inner.state()
    }

    fn state_mut(&mut self) -> &mut PipelineState {
        self.inner.state_mut()
    }

    async fn validate(&mut self, context: &PipelineContext) -> Result<bool> {
        self.inner.validate(context).await
    }

    async fn run(&mut self, context: &PipelineContext) -> Result<PipelineResult> {
        self.inner.run(context).await
    }

    async fn on_cleanup(&mut self) -> Result<()> {
        self.inner.on_cleanup().await
    }

    /// Delegated execute wrapped in start/terminal/end events.
    async fn execute(&mut self, context: &PipelineContext) -> PipelineResult {
        let name = self.inner.name().to_string();
        let started = std::time::Instant::now();

        let mut start_data = Map::new();
        start_data.insert(
            "context_params".to_string(),
            Value::Object(context.params.clone()),
        );
        self.registry
            .broadcast(MonitoringEvent::new(
                EventKind::PipelineStart,
                &name,
                start_data,
            ))
            .await;

        let result = self.inner.execute(context).await;

        if result.is_success() {
            let mut data = Map::new();
            data.insert("status".to_string(), result.status.name().into());
            data.insert("metadata".to_string(), Value::Object(result.metadata.clone()));
            self.registry
                .broadcast(MonitoringEvent::new(EventKind::PipelineSuccess, &name, data))
                .await;
        } else {
            self.registry
                .broadcast(MonitoringEvent::new(
                    EventKind::PipelineError,
                    &name,
                    Self::error_data(&result),
                ))
                .await;
        }

        let mut end_data = Map::new();
        end_data.insert(
            "execution_time_ms".to_string(),
            (started.elapsed().as_millis() as u64).into(),
        );
        self.registry
            .broadcast(MonitoringEvent::new(EventKind::PipelineEnd, &name, end_data))
            .await;

        result
    }
}
