//! Interactive chat loop and single-question runner
//!
//! The run itself executes on a spawned task; this thread multiplexes
//! between run completion and the confirmation feed so write-tool
//! prompts appear the moment the gate suspends a call.

use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use centavo_application::{
    ConfirmationGate, ExecutionContext, LoopFinish, ProviderPort, RunToolLoopUseCase,
    ToolLoopInput, ToolLoopOutcome,
};
use centavo_domain::confirmation::prompt;
use centavo_domain::{ConfirmationDecision, Message, PendingConfirmation, ValidatedToolCall};
use centavo_infrastructure::config::RunSettings;

use crate::presenter::ConsolePresenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
    Prompt,
    AutoApprove,
    AutoReject,
}

pub struct ChatRepl {
    use_case: Arc<RunToolLoopUseCase<dyn ProviderPort>>,
    gate: Arc<ConfirmationGate>,
    feed: mpsc::UnboundedReceiver<PendingConfirmation>,
    presenter: Arc<ConsolePresenter>,
    context: ExecutionContext,
    run: RunSettings,
    mode: ConfirmationMode,
    history: Vec<Message>,
}

impl ChatRepl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        use_case: Arc<RunToolLoopUseCase<dyn ProviderPort>>,
        gate: Arc<ConfirmationGate>,
        feed: mpsc::UnboundedReceiver<PendingConfirmation>,
        presenter: Arc<ConsolePresenter>,
        context: ExecutionContext,
        run: RunSettings,
        mode: ConfirmationMode,
    ) -> Self {
        Self {
            use_case,
            gate,
            feed,
            presenter,
            context,
            run,
            mode,
            history: Vec::new(),
        }
    }

    /// Interactive conversation until the user leaves.
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", "centavo — assistente financeiro".bold());
        println!("{}", "digite sua pergunta, ou \"sair\" para encerrar".dimmed());
        println!();

        loop {
            print!("{} ", "você>".green().bold());
            std::io::stdout().flush()?;

            let mut line = String::new();
            if std::io::stdin().read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "sair" | "exit" | "quit") {
                break;
            }

            self.ask(line).await?;
            // Drop terminal gate entries between turns.
            self.gate.prune_resolved();
        }
        Ok(())
    }

    /// Single question, then exit.
    pub async fn run_once(&mut self, question: &str) -> Result<()> {
        self.ask(question).await
    }

    async fn ask(&mut self, question: &str) -> Result<()> {
        self.history.push(Message::user(question));

        let mut input = ToolLoopInput::new(self.history.clone(), self.context.clone())
            .with_max_iterations(self.run.max_iterations);
        input.system_prompt = self.run.system_prompt.clone();
        input.temperature = self.run.temperature;
        input.max_tokens = self.run.max_tokens;

        let outcome = self.drive(input).await?;
        self.history = outcome.messages.clone();

        if self.presenter.take_streamed() {
            println!();
        } else if !outcome.content.is_empty() {
            println!("{}", outcome.content);
        }
        match &outcome.finish {
            LoopFinish::Completed => {}
            LoopFinish::Truncated => {
                println!("{}", "(resposta truncada pelo limite de passos)".yellow());
            }
            LoopFinish::Aborted(reason) => {
                println!("{} {}", "(execução interrompida)".red(), reason.dimmed());
            }
        }
        println!();
        Ok(())
    }

    /// Run the loop on its own task while answering confirmations here.
    /// Ctrl-C cancels this run only; the next turn starts fresh.
    async fn drive(&mut self, input: ToolLoopInput) -> Result<ToolLoopOutcome> {
        let cancel = CancellationToken::new();
        let input = input.with_cancellation(cancel.clone());
        let use_case = self.use_case.clone();
        let presenter = self.presenter.clone();
        let mut run =
            tokio::spawn(
                async move { use_case.execute_with_progress(input, presenter.as_ref()).await },
            );

        loop {
            tokio::select! {
                outcome = &mut run => return Ok(outcome?),
                Some(pending) = self.feed.recv() => {
                    // Sibling write calls from the same turn arrive
                    // together; answer them with one prompt.
                    let mut batch = vec![pending];
                    while let Ok(extra) = self.feed.try_recv() {
                        batch.push(extra);
                    }
                    self.decide(&batch)?;
                }
                _ = tokio::signal::ctrl_c() => cancel.cancel(),
            }
        }
    }

    fn decide(&self, batch: &[PendingConfirmation]) -> Result<()> {
        let decision = match self.mode {
            ConfirmationMode::AutoApprove => ConfirmationDecision::Accept,
            ConfirmationMode::AutoReject => ConfirmationDecision::Reject,
            ConfirmationMode::Prompt => self.prompt_decision(&batch_prompt(batch))?,
        };
        // The gate arbitrates against expiry; a late answer is a no-op.
        for pending in batch {
            let _ = self.gate.resolve(&pending.correlation_id, decision);
        }
        Ok(())
    }

    fn prompt_decision(&self, message: &str) -> Result<ConfirmationDecision> {
        println!();
        println!("{} {}", "⚠".yellow().bold(), message.bold());
        print!("{} ", "confirmar? [s/N]".yellow());
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok(match answer.trim().to_lowercase().as_str() {
            "s" | "sim" | "y" | "yes" => ConfirmationDecision::Accept,
            _ => ConfirmationDecision::Reject,
        })
    }
}

/// One prompt line covering every write call waiting in this batch.
fn batch_prompt(batch: &[PendingConfirmation]) -> String {
    if let [single] = batch {
        return single.message.clone();
    }
    let calls: Vec<&ValidatedToolCall> = batch.iter().map(|p| &p.tool_call).collect();
    prompt::batch_message(&calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use centavo_domain::ValidatedArgs;
    use chrono::Duration;

    fn pending(id: &str, message: &str) -> PendingConfirmation {
        PendingConfirmation::new(
            ValidatedToolCall::new(id, "create_expense", ValidatedArgs::default()),
            message,
            Duration::minutes(5),
        )
    }

    #[test]
    fn single_pending_uses_its_own_message() {
        let batch = [pending("toolu_1", "Registrar gasto de R$45.00 em outros?")];
        assert_eq!(batch_prompt(&batch), "Registrar gasto de R$45.00 em outros?");
    }

    #[test]
    fn multiple_pendings_collapse_into_one_batch_prompt() {
        let batch = [pending("toolu_1", "a"), pending("toolu_2", "b")];
        let msg = batch_prompt(&batch);
        assert!(msg.starts_with("Executar 2 operações?"));
        assert_eq!(msg.matches('•').count(), 2);
    }
}
