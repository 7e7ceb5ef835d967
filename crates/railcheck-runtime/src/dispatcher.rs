//! Demo dispatcher: one prompt in, one history entry out.
//!
//! The dispatcher owns a single run end to end. It implements:
//! - Prompt resolution (the rail's default prompt and system prompt)
//! - The provider call, bounded by `tokio::time::timeout`
//! - Normalization and validator fan-out through the registry
//! - Worst-outcome aggregation into one verdict
//! - The append to the shared history log
//!
//! Provider failures are recovered into Fail verdicts; `run_demo` never
//! returns an error and never panics. Every run appends exactly one entry,
//! on every path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use railcheck_core::{
    normalize_for_rail, Aggregator, HistoryEntry, Rail, RailConfig, RequestContext,
    ValidatorRegistry, Verdict,
};

use crate::config::RuntimeConfig;
use crate::history::HistoryLog;
use crate::prompts;
use crate::providers::{GenerationRequest, ProviderGateway};
use crate::RuntimeError;

/// Runs rail demos against one provider and records the results.
pub struct Dispatcher {
    gateway: Arc<dyn ProviderGateway>,
    rail_config: RailConfig,
    registry: ValidatorRegistry,
    history: Arc<HistoryLog>,
    provider_timeout: Duration,
}

impl Dispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// The history log this dispatcher appends to.
    pub fn history(&self) -> &Arc<HistoryLog> {
        &self.history
    }

    /// Run one demo and record it.
    ///
    /// # Execution Flow
    /// 1. Resolve the prompt (rail default when blank) and system prompt
    /// 2. Call the provider, bounded by the configured deadline
    /// 3. Normalize and run every validator registered for the rail
    /// 4. Aggregate worst-outcome-wins into one verdict
    /// 5. Append the entry to the history log and return it
    pub async fn run_demo(&self, ctx: &RequestContext) -> HistoryEntry {
        let started = Instant::now();
        let ctx = self.resolve_context(ctx);

        let mut request = GenerationRequest::from_context(&ctx, self.provider_timeout);
        if let Some(system) = prompts::system_prompt(ctx.rail) {
            request = request.with_system(system);
        }

        tracing::debug!(
            rail = %ctx.rail.id(),
            provider = %ctx.provider,
            model = %ctx.model,
            "awaiting provider"
        );

        let call = self.gateway.generate(&request);
        let entry = match tokio::time::timeout(self.provider_timeout, call).await {
            Err(_) => {
                tracing::warn!(
                    rail = %ctx.rail.id(),
                    provider = %ctx.provider,
                    "provider call exceeded the deadline"
                );
                self.timeout_entry(&ctx)
            }
            Ok(Err(error)) if error.is_timeout() => {
                tracing::warn!(
                    rail = %ctx.rail.id(),
                    provider = %ctx.provider,
                    "provider reported a timeout"
                );
                self.timeout_entry(&ctx)
            }
            Ok(Ok(raw)) if raw.is_timed_out() => self.timeout_entry(&ctx),
            Ok(Err(error)) => {
                tracing::warn!(
                    rail = %ctx.rail.id(),
                    provider = %ctx.provider,
                    error = %error,
                    "provider call failed"
                );
                HistoryEntry::new(
                    ctx.rail,
                    &ctx.prompt,
                    Verdict::fail(ctx.rail, format!("provider call failed: {}", error)),
                )
            }
            Ok(Ok(raw)) => {
                tracing::debug!(rail = %ctx.rail.id(), "normalizing response");
                let normalized = normalize_for_rail(&raw, ctx.rail);

                tracing::debug!(rail = %ctx.rail.id(), "validating response");
                let verdicts: Vec<Verdict> = self
                    .registry
                    .validators_for(ctx.rail, &ctx)
                    .iter()
                    .map(|validator| validator.evaluate(&normalized, &ctx, &self.rail_config))
                    .collect();
                let verdict = Aggregator::new().combine(ctx.rail, verdicts);

                HistoryEntry::new(ctx.rail, &ctx.prompt, verdict)
            }
        };

        self.history.append(entry.clone());
        tracing::info!(
            rail = %entry.rail.id(),
            outcome = %entry.verdict.outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run reported"
        );
        entry
    }

    /// Fill in the rail's default prompt when the caller left it blank.
    fn resolve_context(&self, ctx: &RequestContext) -> RequestContext {
        let mut resolved = ctx.clone();
        if resolved.prompt.trim().is_empty() {
            resolved.prompt = prompts::default_prompt(resolved.rail).to_string();
        }
        resolved
    }

    /// Entry for a run that never produced a response. The rail is
    /// `api-timeout` regardless of what was requested.
    fn timeout_entry(&self, ctx: &RequestContext) -> HistoryEntry {
        let verdict = Verdict::fail(
            Rail::ApiTimeout,
            format!(
                "provider exceeded the {} s deadline",
                self.provider_timeout.as_secs()
            ),
        );
        HistoryEntry::new(Rail::ApiTimeout, &ctx.prompt, verdict)
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    gateway: Option<Arc<dyn ProviderGateway>>,
    rail_config: RailConfig,
    registry: ValidatorRegistry,
    history: Option<Arc<HistoryLog>>,
    provider_timeout: Duration,
}

impl DispatcherBuilder {
    /// Create a builder with defaults everywhere a default exists.
    pub fn new() -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            gateway: None,
            rail_config: RailConfig::default(),
            registry: ValidatorRegistry::standard(),
            history: None,
            provider_timeout: runtime.provider_timeout,
        }
    }

    /// Set the provider gateway. Required.
    pub fn gateway(mut self, gateway: Arc<dyn ProviderGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Set the rail thresholds the validators read.
    pub fn rail_config(mut self, config: RailConfig) -> Self {
        self.rail_config = config;
        self
    }

    /// Apply runtime settings (currently the provider deadline).
    pub fn runtime_config(mut self, config: &RuntimeConfig) -> Self {
        self.provider_timeout = config.provider_timeout;
        self
    }

    /// Swap in a non-standard validator registry.
    pub fn registry(mut self, registry: ValidatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Share a history log with other dispatchers or readers.
    pub fn history(mut self, history: Arc<HistoryLog>) -> Self {
        self.history = Some(history);
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> Result<Dispatcher, RuntimeError> {
        let gateway = self
            .gateway
            .ok_or_else(|| RuntimeError::ProviderNotConfigured("no gateway set".to_string()))?;

        Ok(Dispatcher {
            gateway,
            rail_config: self.rail_config,
            registry: self.registry,
            history: self.history.unwrap_or_default(),
            provider_timeout: self.provider_timeout,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::GatewayError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use railcheck_core::{Outcome, RawResponse, RequestOptions};

    enum Behavior {
        Reply(&'static str),
        TimedOutBody,
        ApiError,
        TimeoutError,
        Hang,
    }

    struct MockGateway {
        behavior: Behavior,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl MockGateway {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProviderGateway for MockGateway {
        async fn list_models(&self) -> Result<crate::providers::ModelList, GatewayError> {
            Err(GatewayError::NotConfigured("mock".to_string()))
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<RawResponse, GatewayError> {
            self.seen.lock().push(request.clone());
            match &self.behavior {
                Behavior::Reply(body) => Ok(RawResponse::text(*body)),
                Behavior::TimedOutBody => Ok(RawResponse::TimedOut),
                Behavior::ApiError => Err(GatewayError::Api {
                    status: 500,
                    message: "internal error".to_string(),
                }),
                Behavior::TimeoutError => Err(GatewayError::Timeout(Duration::from_secs(30))),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(RawResponse::text("too late"))
                }
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn dispatcher(behavior: Behavior) -> (Dispatcher, Arc<MockGateway>) {
        let gateway = Arc::new(MockGateway::new(behavior));
        let dispatcher = Dispatcher::builder()
            .gateway(gateway.clone())
            .build()
            .unwrap();
        (dispatcher, gateway)
    }

    fn ctx(rail: Rail, prompt: &str) -> RequestContext {
        RequestContext::new(rail, prompt, "mock", "mock-1")
    }

    #[tokio::test]
    async fn test_passing_sql_run() {
        let (dispatcher, _) = dispatcher(Behavior::Reply(
            "SELECT * FROM users WHERE name = 'Alice';",
        ));

        let entry = dispatcher
            .run_demo(&ctx(Rail::InvalidSql, "SQL for users named Alice"))
            .await;

        assert_eq!(entry.rail, Rail::InvalidSql);
        assert!(entry.verdict.is_pass());
        assert_eq!(dispatcher.history().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_error_becomes_fail_verdict() {
        let (dispatcher, _) = dispatcher(Behavior::ApiError);

        let entry = dispatcher.run_demo(&ctx(Rail::Temporal, "any")).await;

        assert_eq!(entry.rail, Rail::Temporal);
        assert!(entry.verdict.is_fail());
        assert!(entry.verdict.reason.contains("provider call failed"));
        assert_eq!(dispatcher.history().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_error_reports_api_timeout_rail() {
        let (dispatcher, _) = dispatcher(Behavior::TimeoutError);

        let entry = dispatcher.run_demo(&ctx(Rail::InvalidSql, "any")).await;

        assert_eq!(entry.rail, Rail::ApiTimeout);
        assert_eq!(entry.verdict.rail, Rail::ApiTimeout);
        assert!(entry.verdict.is_fail());
        assert!(entry.verdict.reason.contains("deadline"));
    }

    #[tokio::test]
    async fn test_timed_out_body_reports_api_timeout_rail() {
        let (dispatcher, _) = dispatcher(Behavior::TimedOutBody);

        let entry = dispatcher.run_demo(&ctx(Rail::Sensitivity, "any")).await;

        assert_eq!(entry.rail, Rail::ApiTimeout);
        assert!(entry.verdict.is_fail());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_provider_hits_the_deadline() {
        let gateway = Arc::new(MockGateway::new(Behavior::Hang));
        let dispatcher = Dispatcher::builder()
            .gateway(gateway)
            .runtime_config(&RuntimeConfig {
                provider_timeout: Duration::from_secs(2),
                ..Default::default()
            })
            .build()
            .unwrap();

        let entry = dispatcher.run_demo(&ctx(Rail::ApiTimeout, "")).await;

        assert_eq!(entry.rail, Rail::ApiTimeout);
        assert!(entry.verdict.reason.contains("2 s deadline"));
        assert_eq!(dispatcher.history().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_prompt_resolves_to_rail_default() {
        let (dispatcher, gateway) = dispatcher(Behavior::Reply("I don't know that user."));

        let entry = dispatcher.run_demo(&ctx(Rail::PhantomData, "  ")).await;

        let seen = gateway.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, prompts::PHANTOM_DATA_PROMPT);
        assert_eq!(
            seen[0].system.as_deref(),
            Some(prompts::RETRIEVAL_SYSTEM_PROMPT)
        );
        assert!(entry.prompt_summary.contains("Xyzq Phantomopoulos"));
    }

    #[tokio::test]
    async fn test_structured_output_flag_reaches_the_request() {
        let (dispatcher, gateway) = dispatcher(Behavior::Reply(
            r#"{"id": 1, "name": "Alice", "age": 30, "email": "alice@example.com"}"#,
        ));

        let context = ctx(Rail::MismatchedJson, "").with_options(RequestOptions {
            structured_output: true,
            ..Default::default()
        });
        let entry = dispatcher.run_demo(&context).await;

        assert!(gateway.seen.lock()[0].structured_output);
        assert!(entry.verdict.is_pass());
    }

    #[tokio::test]
    async fn test_empty_body_fails_validation() {
        let (dispatcher, _) = dispatcher(Behavior::Reply("   "));

        let entry = dispatcher
            .run_demo(&ctx(Rail::EmptyIncomplete, "say nothing"))
            .await;

        assert_eq!(entry.verdict.outcome, Outcome::Fail);
    }

    #[tokio::test]
    async fn test_concurrent_runs_all_recorded() {
        let gateway = Arc::new(MockGateway::new(Behavior::Reply("fine answer, long enough")));
        let history = Arc::new(HistoryLog::new());
        let dispatcher = Arc::new(
            Dispatcher::builder()
                .gateway(gateway)
                .history(history.clone())
                .build()
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..8 {
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(async move {
                dispatcher
                    .run_demo(&ctx(Rail::EmptyIncomplete, &format!("prompt {}", i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(history.len(), 8);
    }

    #[test]
    fn test_builder_requires_gateway() {
        let result = Dispatcher::builder().build();
        assert!(matches!(
            result,
            Err(RuntimeError::ProviderNotConfigured(_))
        ));
    }
}
