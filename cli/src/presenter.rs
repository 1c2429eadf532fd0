//! Console progress output for a tool-loop run

use colored::Colorize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use centavo_application::LoopProgress;
use centavo_domain::{PendingConfirmation, ToolExecutionResult, ValidatedToolCall};

/// Prints streaming text and tool activity to the terminal.
pub struct ConsolePresenter {
    quiet: bool,
    streamed: AtomicBool,
}

impl ConsolePresenter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            streamed: AtomicBool::new(false),
        }
    }

    /// True if any text was streamed since the last call (the caller
    /// then skips reprinting the final answer).
    pub fn take_streamed(&self) -> bool {
        self.streamed.swap(false, Ordering::SeqCst)
    }
}

impl LoopProgress for ConsolePresenter {
    fn on_content_delta(&self, chunk: &str) {
        self.streamed.store(true, Ordering::SeqCst);
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
    }

    fn on_tool_call(&self, call: &ValidatedToolCall) {
        if self.quiet {
            return;
        }
        println!(
            "\n{} {}",
            "→ executando".dimmed(),
            call.tool_name.cyan()
        );
    }

    fn on_tool_result(&self, result: &ToolExecutionResult) {
        if self.quiet {
            return;
        }
        if result.is_success() {
            println!("{} {}", "✓".green(), result.tool_name.dimmed());
        } else {
            let detail = result
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_default();
            println!("{} {} — {}", "✗".red(), result.tool_name, detail.dimmed());
        }
    }

    fn on_confirmation_required(&self, _pending: &PendingConfirmation) {
        // The REPL owns the interactive prompt.
    }
}
