//! Streaming events for provider responses
//!
//! A stream is a finite sequence of [`StreamEvent`]s ending with a
//! terminal event; it is never restartable — a fresh call begins a
//! fresh stream. Tool-call intents inside a stream arrive as
//! [`ToolCallDelta`](StreamEvent::ToolCallDelta) fragments and must be
//! buffered until the terminal event: partial JSON is never interpreted
//! as an intent boundary.

use super::response::ProviderResponse;

/// An event in a streaming provider response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A text chunk from the model.
    Delta(String),

    /// Incremental tool call data.
    ///
    /// A tool call may arrive in fragments: first `id` and `name`, then
    /// `arguments_delta` pieces that concatenate into the argument JSON.
    /// `index` ties fragments to one call when the model requests
    /// several in a single response.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: Option<String>,
    },

    /// The full normalized response (terminal).
    Completed(ProviderResponse),

    /// An error that ended the stream (terminal).
    Error(String),
}

impl StreamEvent {
    /// Returns the text content if this is a `Delta` event.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed(_) | StreamEvent::Error(_))
    }
}
