// src/pipeline/compose.rs

//! Sequential composition of pipelines.
//!
//! Each member receives the previous member's `result` output as its `data`
//! input, with the original parameters preserved across the chain. Only the
//! first member can be validated against the caller's context up front;
//! later members are validated against the context they actually receive,
//! immediately before running. Any non-success result short-circuits the
//! chain and is returned as the composed result.

use async_trait::async_trait;

use crate::error::Result;

use super::base::{
    Pipeline, PipelineContext, PipelineResult, PipelineState, PipelineStatus,
};

/// A pipeline made of other pipelines run in sequence.
pub struct ComposedPipeline {
    name: String,
    pipelines: Vec<Box<dyn Pipeline>>,
    state: PipelineState,
}

impl ComposedPipeline {
    /// Compose pipelines under a display name.
    pub fn new(name: impl Into<String>, pipelines: Vec<Box<dyn Pipeline>>) -> Self {
        let name = name.into();
        log::debug!(
            "Initialized ComposedPipeline '{name}' with {} components",
            pipelines.len()
        );
        Self {
            name,
            pipelines,
            state: PipelineState::default(),
        }
    }

    /// Number of member pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[async_trait]
impl Pipeline for ComposedPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &PipelineState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    /// Validate the first member against the initial context. Later members
    /// can only be judged once their actual input exists.
    async fn validate(&mut self, context: &PipelineContext) -> Result<bool> {
        if self.pipelines.is_empty() {
            log::error!("Composed pipeline '{}' has no component pipelines", self.name);
            return Ok(false);
        }
        let valid = self.pipelines[0].validate(context).await?;
        if !valid {
            log::error!("Validation failed for first component in '{}'", self.name);
        }
        Ok(valid)
    }

    async fn run(&mut self, context: &PipelineContext) -> Result<PipelineResult> {
        log::info!("Executing composed pipeline '{}'", self.name);

        let last = self.pipelines.len() - 1;
        let mut current_context = context.clone();

        for index in 0..self.pipelines.len() {
            log::debug!("Executing component {index} in '{}'", self.name);

            // The first member was validated by the composed validate; the
            // rest face their actual received context here.
            if index > 0 {
                let valid = self.pipelines[index].validate(&current_context).await?;
                if !valid {
                    log::error!(
                        "Validation failed for component {index} in '{}'",
                        self.name
                    );
                    let mut result = PipelineResult::validation_failure(format!(
                        "Pipeline validation failed for component {index}"
                    ));
                    result.metadata.insert(
                        "component_name".to_string(),
                        self.pipelines[index].name().into(),
                    );
                    return Ok(result);
                }
            }

            let mut result = self.pipelines[index].execute(&current_context).await;

            if !result.is_success() {
                log::error!(
                    "Component {index} in '{}' failed with status: {}",
                    self.name,
                    result.status.name()
                );
                result
                    .metadata
                    .insert("component_index".to_string(), index.into());
                return Ok(result);
            }

            if index == last {
                return Ok(result);
            }

            // Pipe this member's result into the next member's data slot,
            // keeping the original params.
            let Some(piped) = result.output_data.remove("result") else {
                log::error!(
                    "Component {index} in '{}' produced no 'result' output",
                    self.name
                );
                result.status = PipelineStatus::Failure;
                result
                    .metadata
                    .insert("component_index".to_string(), index.into());
                result.metadata.insert(
                    "error_msg".to_string(),
                    "missing 'result' output for chaining".into(),
                );
                return Ok(result);
            };
            current_context = PipelineContext::with_params(context.params.clone())
                .input("data", piped);
        }

        unreachable!("loop returns on the last component")
    }

    /// Clean up every member regardless of which one failed. Member cleanup
    /// errors are already logged and swallowed individually.
    async fn on_cleanup(&mut self) -> Result<()> {
        log::debug!("Cleaning up composed pipeline '{}'", self.name);
        for pipeline in &mut self.pipelines {
            pipeline.cleanup().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::pipeline::base::tests::TestPipeline;

    fn chain(members: Vec<TestPipeline>) -> ComposedPipeline {
        let boxed: Vec<Box<dyn Pipeline>> = members
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn Pipeline>)
            .collect();
        ComposedPipeline::new("chain", boxed)
    }

    #[tokio::test]
    async fn test_pipes_output_to_next_input() {
        let mut first = TestPipeline::new();
        first.output = 10;
        let mut composed = chain(vec![first, TestPipeline::new(), TestPipeline::new()]);

        let result = composed.execute(&PipelineContext::new()).await;

        assert!(result.is_success());
        // 10 doubled twice by the downstream members.
        let value = result.output_data["result"].as_json().unwrap();
        assert_eq!(value.as_i64(), Some(40));
    }

    #[tokio::test]
    async fn test_short_circuit_on_member_failure() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let mut second = TestPipeline::new();
        second.run_error = true;
        let third_runs = Arc::new(AtomicU32::new(0));
        let mut third = TestPipeline::new();
        third.probe = Some(Arc::clone(&third_runs));
        let mut composed = chain(vec![TestPipeline::new(), second, third]);

        let result = composed.execute(&PipelineContext::new()).await;

        assert_eq!(result.status, PipelineStatus::Failure);
        assert_eq!(
            result.metadata.get("component_index").and_then(Value::as_u64),
            Some(1)
        );
        // The failing member's result came back unchanged.
        assert_eq!(
            result.metadata.get("error_type").and_then(Value::as_str),
            Some("InvalidArgument")
        );
        // The third member never ran.
        assert_eq!(third_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_midway_validation_failure_short_circuits() {
        let mut second = TestPipeline::new();
        second.valid = false;
        let mut composed = chain(vec![TestPipeline::new(), second, TestPipeline::new()]);

        let result = composed.execute(&PipelineContext::new()).await;

        assert_eq!(result.status, PipelineStatus::ValidationFailure);
        assert_eq!(
            result.metadata.get("component_name").and_then(Value::as_str),
            Some("TestPipeline")
        );
    }

    #[tokio::test]
    async fn test_empty_composition_fails_validation() {
        let mut composed = ComposedPipeline::new("empty", Vec::new());
        let result = composed.execute(&PipelineContext::new()).await;
        assert_eq!(result.status, PipelineStatus::ValidationFailure);
    }

    #[tokio::test]
    async fn test_invalid_first_member_fails_validation() {
        let mut first = TestPipeline::new();
        first.valid = false;
        let mut composed = chain(vec![first, TestPipeline::new()]);

        let result = composed.execute(&PipelineContext::new()).await;
        assert_eq!(result.status, PipelineStatus::ValidationFailure);
    }

    #[tokio::test]
    async fn test_params_preserved_across_chain() {
        let mut composed = chain(vec![TestPipeline::new(), TestPipeline::new()]);
        let context = PipelineContext::new().param("season", 2023);

        let result = composed.execute(&context).await;
        assert!(result.is_success());
    }
}
