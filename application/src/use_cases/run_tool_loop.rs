//! The tool loop: drive a model to completion through tool calls
//!
//! One run repeats model call -> validate intents -> (gate writes) ->
//! execute -> append results until the model answers without tool
//! calls, the iteration cap trips, or the run aborts. Every intent in a
//! turn yields exactly one tool-result message, appended in the order
//! the model emitted the intents even though execution is concurrent.

use std::future::Future;
use std::time::Duration as StdDuration;

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use centavo_domain::confirmation::prompt;
use centavo_domain::{
    ConfirmationDecision, Message, PendingConfirmation, ProviderResponse, Resolution, StreamEvent,
    TokenUsage, ToolCallIntent, ToolError, ToolErrorKind, ToolExecutionResult,
};

use crate::executor::ToolExecutor;
use crate::gate::ConfirmationGate;
use crate::ports::{
    CompletionRequest, LoopProgress, NoProgress, ProviderError, ProviderPort, StreamAssembler,
};
use crate::retry::RetryPolicy;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Appended when the iteration cap trips with work still pending.
const TRUNCATION_NOTICE: &str =
    "Não consegui concluir dentro do limite de passos. Tente um pedido mais específico.";

/// Input for one tool-loop run.
#[derive(Debug, Clone)]
pub struct ToolLoopInput {
    pub messages: Vec<Message>,
    pub context: crate::ports::ExecutionContext,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_iterations: u32,
    /// Token scoped to this run. Takes precedence over any token the
    /// use case was built with.
    pub cancellation: Option<CancellationToken>,
}

impl ToolLoopInput {
    pub fn new(messages: Vec<Message>, context: crate::ports::ExecutionContext) -> Self {
        Self {
            messages,
            context,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cancellation: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopFinish {
    /// The model answered without requesting tools.
    Completed,
    /// The iteration cap tripped with tool work still pending.
    Truncated,
    /// The run stopped early (provider failure or cancellation); the
    /// reason is user-displayable.
    Aborted(String),
}

impl LoopFinish {
    pub fn is_completed(&self) -> bool {
        matches!(self, LoopFinish::Completed)
    }
}

/// Result of a run. The transcript is always present, whatever the
/// finish — an aborted run still shows everything up to the abort.
#[derive(Debug, Clone)]
pub struct ToolLoopOutcome {
    pub messages: Vec<Message>,
    /// Last assistant text (the displayable answer)
    pub content: String,
    pub finish: LoopFinish,
    /// Provider calls made
    pub iterations: u32,
    pub usage: TokenUsage,
}

enum CallOutcome {
    Response(ProviderResponse),
    Failed(ProviderError),
    Cancelled,
}

enum Decision {
    Resolved(Resolution),
    Cancelled,
}

struct Cancelled;

pub struct RunToolLoopUseCase<P: ?Sized> {
    provider: Arc<P>,
    executor: Arc<ToolExecutor>,
    gate: Arc<ConfirmationGate>,
    retry: RetryPolicy,
    cancellation_token: Option<CancellationToken>,
}

impl<P: ProviderPort + ?Sized> RunToolLoopUseCase<P> {
    pub fn new(provider: Arc<P>, executor: Arc<ToolExecutor>, gate: Arc<ConfirmationGate>) -> Self {
        Self {
            provider,
            executor,
            gate,
            retry: RetryPolicy::default(),
            cancellation_token: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub async fn execute(&self, input: ToolLoopInput) -> ToolLoopOutcome {
        self.execute_with_progress(input, &NoProgress).await
    }

    pub async fn execute_with_progress(
        &self,
        input: ToolLoopInput,
        progress: &dyn LoopProgress,
    ) -> ToolLoopOutcome {
        let ToolLoopInput {
            mut messages,
            context,
            system_prompt,
            temperature,
            max_tokens,
            max_iterations,
            cancellation,
        } = input;

        // A token on the input is scoped to this run; otherwise fall
        // back to the token the use case was built with, if any.
        let cancel = cancellation.or_else(|| self.cancellation_token.clone());
        let cancel = cancel.as_ref();

        let tools = self.executor.catalog().to_api_tools();
        let mut usage = TokenUsage::default();
        let mut iterations = 0u32;
        let mut content = String::new();

        let finish = loop {
            if is_cancelled(cancel) {
                break LoopFinish::Aborted("cancelado".to_string());
            }
            if iterations >= max_iterations {
                warn!(max_iterations, "iteration cap reached, truncating run");
                content = TRUNCATION_NOTICE.to_string();
                messages.push(Message::assistant(TRUNCATION_NOTICE));
                break LoopFinish::Truncated;
            }
            iterations += 1;
            progress.on_iteration(iterations);

            let mut request = CompletionRequest::new(messages.clone()).with_tools(tools.clone());
            request.system_prompt = system_prompt.clone();
            request.temperature = temperature;
            request.max_tokens = max_tokens;

            let response = match self.call_provider(&request, cancel, progress).await {
                CallOutcome::Response(response) => response,
                CallOutcome::Cancelled => break LoopFinish::Aborted("cancelado".to_string()),
                CallOutcome::Failed(e) => {
                    error!(error = %e, "provider call failed, aborting run");
                    break LoopFinish::Aborted(e.to_string());
                }
            };
            usage.add(response.usage);

            // Only a tool_calls finish authorizes execution; stray
            // intents on any other finish are dropped with the turn.
            let has_work = response.finish_reason.is_tool_calls() && !response.tool_calls.is_empty();
            if !has_work {
                content = response.content.clone();
                messages.push(Message::assistant(response.content));
                break LoopFinish::Completed;
            }

            debug!(
                iteration = iterations,
                count = response.tool_calls.len(),
                "model requested tool calls"
            );
            if !response.content.is_empty() {
                content = response.content.clone();
            }
            messages.push(Message::assistant_with_tools(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            // Concurrent execution; join_all preserves intent order in
            // its output, so results append in the order the model
            // asked, not completion order.
            let results = join_all(
                response
                    .tool_calls
                    .iter()
                    .map(|intent| self.process_intent(intent, &context, cancel, progress)),
            )
            .await;
            for result in results {
                messages.push(result.into_message());
            }
        };

        info!(
            iterations,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            finish = ?finish,
            "tool loop finished"
        );
        ToolLoopOutcome {
            messages,
            content,
            finish,
            iterations,
            usage,
        }
    }

    /// Validate one intent and carry it through gate and executor.
    /// Always produces a result; nothing here unwinds the pass.
    async fn process_intent(
        &self,
        intent: &ToolCallIntent,
        context: &crate::ports::ExecutionContext,
        cancel: Option<&CancellationToken>,
        progress: &dyn LoopProgress,
    ) -> ToolExecutionResult {
        let call = match self.executor.catalog().validate_intent(intent) {
            Ok(call) => call,
            Err(error) => {
                warn!(tool = %intent.tool_name, %error, "rejected tool intent");
                let result =
                    ToolExecutionResult::failure(&intent.correlation_id, &intent.tool_name, error);
                progress.on_tool_result(&result);
                return result;
            }
        };
        progress.on_tool_call(&call);

        let requires_confirmation = self
            .executor
            .catalog()
            .get(&call.tool_name)
            .map(|d| d.requires_confirmation)
            .unwrap_or(true);

        let result = if requires_confirmation {
            let message = prompt::confirmation_message(&call);
            let (pending, ticket) = self.gate.request(call.clone(), message);
            progress.on_confirmation_required(&pending);

            match self.await_decision(&pending, ticket, cancel).await {
                Decision::Resolved(Resolution::Accepted) => {
                    self.executor.execute(&call, context).await
                }
                Decision::Resolved(Resolution::Rejected) => ToolExecutionResult::failure(
                    &call.correlation_id,
                    &call.tool_name,
                    ToolError::user_rejected(),
                ),
                Decision::Resolved(Resolution::Expired) => ToolExecutionResult::failure(
                    &call.correlation_id,
                    &call.tool_name,
                    ToolError::expired(),
                ),
                Decision::Cancelled => ToolExecutionResult::failure(
                    &call.correlation_id,
                    &call.tool_name,
                    ToolError::new(
                        ToolErrorKind::UserRejected,
                        "a execução foi cancelada antes da decisão",
                    ),
                ),
            }
        } else {
            self.executor.execute(&call, context).await
        };
        progress.on_tool_result(&result);
        result
    }

    /// Wait for the gate decision with a deadline at the entry's
    /// expiry. The gate arbitrates ties: whichever of decision and
    /// expiry transitions first wins, exactly once.
    async fn await_decision(
        &self,
        pending: &PendingConfirmation,
        ticket: oneshot::Receiver<Resolution>,
        cancel: Option<&CancellationToken>,
    ) -> Decision {
        let wait = (pending.expires_at - Utc::now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);

        let resolved = async {
            match tokio::time::timeout(wait, ticket).await {
                Ok(Ok(resolution)) => resolution,
                // Gate dropped without resolving; treat as expiry.
                Ok(Err(_)) => Resolution::Expired,
                Err(_) => self
                    .gate
                    .expire(&pending.correlation_id)
                    .unwrap_or(Resolution::Expired),
            }
        };

        match cancellable(cancel, resolved).await {
            Ok(resolution) => Decision::Resolved(resolution),
            Err(Cancelled) => {
                // Close the entry so a late decision cannot execute.
                let _ = self
                    .gate
                    .resolve(&pending.correlation_id, ConfirmationDecision::Reject);
                Decision::Cancelled
            }
        }
    }

    /// One provider call with retry on transient failures.
    async fn call_provider(
        &self,
        request: &CompletionRequest,
        cancel: Option<&CancellationToken>,
        progress: &dyn LoopProgress,
    ) -> CallOutcome {
        let mut attempt = 1u32;
        loop {
            let error = match self.one_attempt(request, cancel, progress).await {
                Ok(response) => return CallOutcome::Response(response),
                Err(AttemptError::Cancelled) => return CallOutcome::Cancelled,
                Err(AttemptError::Provider(e)) => e,
            };
            if !self.retry.should_retry(attempt, &error) {
                return CallOutcome::Failed(error);
            }
            let delay = self.retry.delay_after(attempt, &error);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "provider call failed, retrying"
            );
            if cancellable(cancel, tokio::time::sleep(delay)).await.is_err() {
                return CallOutcome::Cancelled;
            }
            attempt += 1;
        }
    }

    async fn one_attempt(
        &self,
        request: &CompletionRequest,
        cancel: Option<&CancellationToken>,
        progress: &dyn LoopProgress,
    ) -> Result<ProviderResponse, AttemptError> {
        let mut handle = cancellable(cancel, self.provider.stream_complete(request))
            .await
            .map_err(|_| AttemptError::Cancelled)?
            .map_err(AttemptError::Provider)?;

        let mut assembler = StreamAssembler::new();
        loop {
            let event = cancellable(cancel, handle.next_event())
                .await
                .map_err(|_| AttemptError::Cancelled)?;
            let Some(event) = event else {
                return Err(AttemptError::Provider(ProviderError::InvalidResponse(
                    "stream ended without a terminal event".to_string(),
                )));
            };
            if let StreamEvent::Delta(chunk) = &event {
                progress.on_content_delta(chunk);
            }
            if let Some(outcome) = assembler.push(event) {
                return outcome.map_err(AttemptError::Provider);
            }
        }
    }

}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(|t| t.is_cancelled())
}

async fn cancellable<F: Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Result<F::Output, Cancelled> {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(Cancelled),
            out = fut => Ok(out),
        },
        None => Ok(fut.await),
    }
}

enum AttemptError {
    Provider(ProviderError),
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use centavo_domain::{
        FieldSpec, FieldType, FinishReason, MessageRole, ParameterSchema, ToolCatalog,
        ToolDefinition, ValidatedArgs,
    };
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    use crate::ports::{ExecutionContext, ProviderInfo, ToolHandler};

    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderPort for ScriptedProvider {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))
        }

        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                provider: "scripted".to_string(),
                model: "test".to_string(),
                protocol_version: "test".to_string(),
            }
        }
    }

    struct RecordingHandler {
        executed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ToolHandler for RecordingHandler {
        async fn handle(
            &self,
            arguments: &ValidatedArgs,
            _context: &ExecutionContext,
        ) -> Result<serde_json::Value, ToolError> {
            if let Some(ms) = arguments.get_i64("delay_ms") {
                tokio::time::sleep(StdDuration::from_millis(ms as u64)).await;
            }
            let tag = arguments
                .get_str("tag")
                .map(String::from)
                .unwrap_or_else(|| "sem-tag".to_string());
            self.executed.lock().unwrap().push(tag.clone());
            Ok(json!({"ok": true, "tag": tag}))
        }
    }

    fn catalog() -> ToolCatalog {
        ToolCatalog::new()
            .register(
                ToolDefinition::read("get_expenses", "Consulta despesas").with_parameters(
                    ParameterSchema::new().with_field(FieldSpec::optional(
                        "month",
                        "Mês (1-12)",
                        FieldType::integer_range(1, 12),
                    )),
                ),
            )
            .register(
                ToolDefinition::read("slow_scan", "Varredura lenta").with_parameters(
                    ParameterSchema::new()
                        .with_field(FieldSpec::required("tag", "Etiqueta", FieldType::Text))
                        .with_field(FieldSpec::optional(
                            "delay_ms",
                            "Atraso",
                            FieldType::integer(),
                        )),
                ),
            )
            .register(
                ToolDefinition::write("create_expense", "Registra uma despesa").with_parameters(
                    ParameterSchema::new()
                        .with_field(FieldSpec::required("name", "Nome", FieldType::Text)),
                ),
            )
    }

    struct Harness {
        provider: Arc<ScriptedProvider>,
        gate: Arc<ConfirmationGate>,
        feed: Option<mpsc::UnboundedReceiver<PendingConfirmation>>,
        executed: Arc<Mutex<Vec<String>>>,
        use_case: RunToolLoopUseCase<ScriptedProvider>,
    }

    fn harness(script: Vec<Result<ProviderResponse, ProviderError>>) -> Harness {
        harness_with_ttl(script, ChronoDuration::minutes(5))
    }

    fn harness_with_ttl(
        script: Vec<Result<ProviderResponse, ProviderError>>,
        ttl: ChronoDuration,
    ) -> Harness {
        let provider = ScriptedProvider::new(script);
        let (gate, feed) = ConfirmationGate::new(ttl);
        let gate = Arc::new(gate);
        let executed = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(RecordingHandler {
            executed: executed.clone(),
        });
        let executor = Arc::new(
            ToolExecutor::new(Arc::new(catalog()))
                .register("get_expenses", handler.clone())
                .register("slow_scan", handler.clone())
                .register("create_expense", handler),
        );
        let use_case = RunToolLoopUseCase::new(provider.clone(), executor, gate.clone())
            .with_retry_policy(RetryPolicy::none());
        Harness {
            provider,
            gate,
            feed: Some(feed),
            executed,
            use_case,
        }
    }

    /// Spawn a responder that applies `decision` to every pending entry.
    fn auto_decide(harness: &mut Harness, decision: ConfirmationDecision) {
        let mut feed = harness.feed.take().unwrap();
        let gate = harness.gate.clone();
        tokio::spawn(async move {
            while let Some(pending) = feed.recv().await {
                let _ = gate.resolve(&pending.correlation_id, decision);
            }
        });
    }

    fn text(content: &str) -> Result<ProviderResponse, ProviderError> {
        let mut response = ProviderResponse::from_text(content);
        response.usage = TokenUsage::new(10, 5);
        Ok(response)
    }

    fn tool_turn(intents: Vec<ToolCallIntent>) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            content: String::new(),
            tool_calls: intents,
            usage: TokenUsage::new(20, 8),
            finish_reason: FinishReason::ToolCalls,
        })
    }

    fn input() -> ToolLoopInput {
        ToolLoopInput::new(
            vec![Message::user("quanto gastei esse mês?")],
            ExecutionContext::new("user-1"),
        )
    }

    fn tool_messages(outcome: &ToolLoopOutcome) -> Vec<&Message> {
        outcome.messages.iter().filter(|m| m.is_tool_result()).collect()
    }

    #[tokio::test]
    async fn plain_answer_completes_in_one_pass() {
        let h = harness(vec![text("Você gastou R$450 este mês.")]);
        let outcome = h.use_case.execute(input()).await;

        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert_eq!(outcome.content, "Você gastou R$450 este mês.");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(h.provider.calls(), 1);
        assert_eq!(outcome.messages.last().unwrap().role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn read_tool_executes_without_the_gate() {
        let h = harness(vec![
            tool_turn(vec![ToolCallIntent::new(
                "toolu_1",
                "get_expenses",
                json!({"month": 3}),
            )]),
            text("Em março você gastou R$450."),
        ]);
        let outcome = h.use_case.execute(input()).await;

        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(h.executed.lock().unwrap().len(), 1);
        assert!(h.gate.pending().is_empty());

        // Assistant tool turn recorded with its intents, then the result.
        assert_eq!(outcome.messages[1].tool_calls.len(), 1);
        let tools = tool_messages(&outcome);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool_call_id.as_deref(), Some("toolu_1"));
        assert!(tools[0].content.contains("\"ok\":true"));
    }

    #[tokio::test]
    async fn accepted_write_executes_exactly_once() {
        let mut h = harness(vec![
            tool_turn(vec![ToolCallIntent::new(
                "toolu_1",
                "create_expense",
                json!({"name": "Mercado"}),
            )]),
            text("Gasto registrado!"),
        ]);
        auto_decide(&mut h, ConfirmationDecision::Accept);
        let outcome = h.use_case.execute(input()).await;

        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert_eq!(h.executed.lock().unwrap().len(), 1);
        assert_eq!(
            h.gate.state_of("toolu_1"),
            Some(centavo_domain::ConfirmationState::Accepted)
        );
    }

    #[tokio::test]
    async fn rejected_write_never_executes_and_the_loop_continues() {
        let mut h = harness(vec![
            tool_turn(vec![ToolCallIntent::new(
                "toolu_1",
                "create_expense",
                json!({"name": "Mercado"}),
            )]),
            text("Tudo bem, não registrei."),
        ]);
        auto_decide(&mut h, ConfirmationDecision::Reject);
        let outcome = h.use_case.execute(input()).await;

        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert!(h.executed.lock().unwrap().is_empty());

        let tools = tool_messages(&outcome);
        assert_eq!(tools.len(), 1);
        assert!(tools[0].content.contains("user_rejected"));
        // The model still got to respond after the rejection.
        assert_eq!(outcome.content, "Tudo bem, não registrei.");
    }

    #[tokio::test]
    async fn expired_confirmation_behaves_like_rejection() {
        // Zero TTL and no responder: the gate entry expires unattended.
        let h = harness_with_ttl(
            vec![
                tool_turn(vec![ToolCallIntent::new(
                    "toolu_1",
                    "create_expense",
                    json!({"name": "Mercado"}),
                )]),
                text("O pedido expirou, nada foi registrado."),
            ],
            ChronoDuration::zero(),
        );
        let outcome = h.use_case.execute(input()).await;

        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert!(h.executed.lock().unwrap().is_empty());
        // The model sees a rejection; only the gate keeps the
        // distinction.
        let tools = tool_messages(&outcome);
        assert!(tools[0].content.contains("user_rejected"));
        assert_eq!(
            h.gate.state_of("toolu_1"),
            Some(centavo_domain::ConfirmationState::Expired)
        );
    }

    #[tokio::test]
    async fn stray_intents_on_a_stop_finish_are_not_executed() {
        let mut turn = ProviderResponse::from_text("Você gastou R$450.");
        turn.tool_calls = vec![ToolCallIntent::new(
            "toolu_1",
            "get_expenses",
            json!({"month": 3}),
        )];
        // finish_reason stays Stop: the intents do not authorize work.
        let h = harness(vec![Ok(turn)]);
        let outcome = h.use_case.execute(input()).await;

        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert_eq!(outcome.content, "Você gastou R$450.");
        assert!(h.executed.lock().unwrap().is_empty());
        assert!(tool_messages(&outcome).is_empty());
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_handler() {
        let h = harness(vec![
            tool_turn(vec![ToolCallIntent::new(
                "toolu_1",
                "get_expenses",
                json!({"month": 42}),
            )]),
            text("Qual mês você quer consultar?"),
        ]);
        let outcome = h.use_case.execute(input()).await;

        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert!(h.executed.lock().unwrap().is_empty());
        let tools = tool_messages(&outcome);
        assert!(tools[0].content.contains("invalid_arguments"));
        assert!(tools[0].content.contains("month"));
    }

    #[tokio::test]
    async fn unknown_tool_fails_closed() {
        let h = harness(vec![
            tool_turn(vec![ToolCallIntent::new("toolu_1", "drop_database", json!({}))]),
            text("Não tenho essa ferramenta."),
        ]);
        let outcome = h.use_case.execute(input()).await;

        assert!(h.executed.lock().unwrap().is_empty());
        let tools = tool_messages(&outcome);
        assert!(tools[0].content.contains("unknown_tool"));
    }

    #[tokio::test]
    async fn iteration_cap_truncates_after_exactly_that_many_calls() {
        let loop_turn = || {
            tool_turn(vec![ToolCallIntent::new(
                "toolu_n",
                "get_expenses",
                json!({"month": 1}),
            )])
        };
        let h = harness(vec![loop_turn(), loop_turn(), loop_turn(), loop_turn()]);
        let outcome = h
            .use_case
            .execute(input().with_max_iterations(3))
            .await;

        assert_eq!(outcome.finish, LoopFinish::Truncated);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(h.provider.calls(), 3);
        let last = outcome.messages.last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.content, TRUNCATION_NOTICE);
    }

    #[tokio::test]
    async fn results_append_in_intent_order_despite_skewed_latency() {
        let h = harness(vec![
            tool_turn(vec![
                ToolCallIntent::new(
                    "toolu_a",
                    "slow_scan",
                    json!({"tag": "primeiro", "delay_ms": 40}),
                ),
                ToolCallIntent::new(
                    "toolu_b",
                    "slow_scan",
                    json!({"tag": "segundo", "delay_ms": 0}),
                ),
            ]),
            text("Prontinho."),
        ]);
        let outcome = h.use_case.execute(input()).await;

        // The fast call finished first...
        assert_eq!(
            *h.executed.lock().unwrap(),
            vec!["segundo".to_string(), "primeiro".to_string()]
        );
        // ...but the transcript keeps the model's order.
        let tools = tool_messages(&outcome);
        assert_eq!(tools[0].tool_call_id.as_deref(), Some("toolu_a"));
        assert_eq!(tools[1].tool_call_id.as_deref(), Some("toolu_b"));
    }

    #[tokio::test]
    async fn one_result_per_intent_in_a_mixed_turn() {
        let mut h = harness(vec![
            tool_turn(vec![
                ToolCallIntent::new("toolu_1", "get_expenses", json!({"month": 2})),
                ToolCallIntent::new("toolu_2", "create_expense", json!({"name": "Luz"})),
                ToolCallIntent::new("toolu_3", "no_such_tool", json!({})),
            ]),
            text("Feito."),
        ]);
        auto_decide(&mut h, ConfirmationDecision::Accept);
        let outcome = h.use_case.execute(input()).await;

        let tools = tool_messages(&outcome);
        assert_eq!(tools.len(), 3);
        assert_eq!(tools[0].tool_call_id.as_deref(), Some("toolu_1"));
        assert_eq!(tools[1].tool_call_id.as_deref(), Some("toolu_2"));
        assert!(tools[2].content.contains("unknown_tool"));
    }

    #[tokio::test]
    async fn provider_failure_aborts_but_keeps_the_transcript() {
        let h = harness(vec![Err(ProviderError::AuthFailed("chave inválida".into()))]);
        let outcome = h.use_case.execute(input()).await;

        assert!(matches!(outcome.finish, LoopFinish::Aborted(_)));
        // The transcript up to the abort survives.
        assert_eq!(outcome.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn transient_failure_retries_then_succeeds() {
        let mut h = harness(vec![
            Err(ProviderError::Unavailable("502".into())),
            text("Voltei!"),
        ]);
        h.use_case = h.use_case.with_retry_policy(
            RetryPolicy {
                initial_delay: StdDuration::from_millis(1),
                ..Default::default()
            }
            .with_max_attempts(2),
        );
        let outcome = h.use_case.execute(input()).await;

        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert_eq!(h.provider.calls(), 2);
        assert_eq!(outcome.content, "Voltei!");
    }

    #[tokio::test]
    async fn non_retryable_failure_is_not_retried() {
        let h = harness(vec![
            Err(ProviderError::AuthFailed("chave inválida".into())),
            text("nunca chega aqui"),
        ]);
        let outcome = h.use_case.execute(input()).await;

        assert!(matches!(outcome.finish, LoopFinish::Aborted(_)));
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_before_the_first_pass_makes_no_calls() {
        let mut h = harness(vec![text("nunca chega aqui")]);
        let token = CancellationToken::new();
        token.cancel();
        h.use_case = h.use_case.with_cancellation(token);
        let outcome = h.use_case.execute(input()).await;

        assert!(matches!(outcome.finish, LoopFinish::Aborted(_)));
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(outcome.iterations, 0);
    }

    #[tokio::test]
    async fn run_scoped_cancellation_does_not_outlive_its_run() {
        let h = harness(vec![text("primeira"), text("segunda")]);

        let token = CancellationToken::new();
        token.cancel();
        let aborted = h
            .use_case
            .execute(input().with_cancellation(token))
            .await;
        assert!(matches!(aborted.finish, LoopFinish::Aborted(_)));
        assert_eq!(h.provider.calls(), 0);

        // The next run carries no token and proceeds normally.
        let outcome = h.use_case.execute(input()).await;
        assert_eq!(outcome.finish, LoopFinish::Completed);
        assert_eq!(outcome.content, "primeira");
    }

    #[tokio::test]
    async fn usage_accumulates_across_passes() {
        let h = harness(vec![
            tool_turn(vec![ToolCallIntent::new(
                "toolu_1",
                "get_expenses",
                json!({}),
            )]),
            text("Pronto."),
        ]);
        let outcome = h.use_case.execute(input()).await;

        // 20+10 input, 8+5 output across the two passes.
        assert_eq!(outcome.usage, TokenUsage::new(30, 13));
    }
}
