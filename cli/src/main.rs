//! CLI entrypoint for centavo
//!
//! Wires the layers together: configuration, the provider adapter, the
//! finance store and tools, the confirmation gate and the chat loop.

mod cli;
mod presenter;
mod repl;

use anyhow::{Result, bail};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use centavo_application::{ConfirmationGate, ExecutionContext, RetryPolicy, RunToolLoopUseCase};
use centavo_infrastructure::tools::InMemoryFinanceStore;
use centavo_infrastructure::{ConfigLoader, build_provider, finance_executor};

use crate::cli::Cli;
use crate::presenter::ConsolePresenter;
use crate::repl::{ChatRepl, ConfirmationMode};

const DEFAULT_SYSTEM_PROMPT: &str = "Você é o centavo, um assistente de finanças pessoais. \
Responda em português de forma direta e use as ferramentas disponíveis para consultar e \
registrar dados antes de afirmar qualquer número.";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = ConfigLoader::load(cli.config.as_ref())?;
    if let Some(max_iterations) = cli.max_iterations {
        config.run.max_iterations = max_iterations;
    }
    if config.run.system_prompt.is_none() {
        config.run.system_prompt = Some(DEFAULT_SYSTEM_PROMPT.to_string());
    }

    info!(
        provider = ?config.provider.kind,
        model = %config.provider.model,
        "starting centavo"
    );

    // === Dependency injection ===
    let provider = build_provider(&config.provider)?;

    let store = Arc::new(InMemoryFinanceStore::new());
    store.seed_demo(&cli.user);
    let executor = Arc::new(finance_executor(store));

    let ttl = chrono::Duration::seconds(config.confirmation.ttl_seconds as i64);
    let (gate, feed) = ConfirmationGate::new(ttl);
    let gate = Arc::new(gate);

    let mut retry = RetryPolicy::default();
    if let Some(max_attempts) = config.retry.max_attempts {
        retry = retry.with_max_attempts(max_attempts);
    }

    let use_case = Arc::new(
        RunToolLoopUseCase::new(provider, executor, gate.clone()).with_retry_policy(retry),
    );

    let mode = if cli.auto_approve {
        ConfirmationMode::AutoApprove
    } else if cli.auto_reject {
        ConfirmationMode::AutoReject
    } else {
        ConfirmationMode::Prompt
    };

    let presenter = Arc::new(ConsolePresenter::new(cli.quiet));
    let context = ExecutionContext::new(cli.user.as_str()).with_timezone("America/Sao_Paulo");
    let mut repl = ChatRepl::new(
        use_case,
        gate,
        feed,
        presenter,
        context,
        config.run.clone(),
        mode,
    );

    if cli.chat {
        return repl.run().await;
    }

    let Some(question) = cli.question.as_deref() else {
        bail!("informe uma pergunta, ou use --chat para o modo interativo");
    };
    repl.run_once(question).await
}
