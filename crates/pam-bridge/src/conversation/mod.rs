//! Typed conversations across the native boundary
//!
//! Applications answer prompts through a [`ConversationHandler`]; modules
//! issue prompts through [`crate::ModuleTransaction::start_conv_multi`] and
//! friends. Both sides exchange [`ConvRequest`] / [`ConvResponse`] values and
//! never see the native message arrays.

pub mod binary;
mod protocol;
pub(crate) mod trampoline;

pub use binary::{BinaryPrompt, FramingError};

use crate::types::Style;

/// Application-side answerer for text prompts
pub trait ConversationHandler: Send + Sync {
    /// Answer one message. Informational styles (`ErrorMsg`, `TextInfo`)
    /// usually return an empty string.
    fn respond(&self, style: Style, prompt: &str) -> anyhow::Result<String>;

    /// Binary capability, if this handler has it
    fn as_binary(&self) -> Option<&dyn BinaryConversationHandler> {
        None
    }
}

/// Handler that also speaks the Linux-PAM binary protocol
///
/// Implementors advertise it through [`ConversationHandler::as_binary`].
pub trait BinaryConversationHandler: ConversationHandler {
    fn respond_binary(&self, prompt: &BinaryPrompt) -> anyhow::Result<BinaryPrompt>;
}

/// Adapter turning a closure into a [`ConversationHandler`]
pub struct ConversationFunc<F>(pub F);

impl<F> ConversationHandler for ConversationFunc<F>
where
    F: Fn(Style, &str) -> anyhow::Result<String> + Send + Sync,
{
    fn respond(&self, style: Style, prompt: &str) -> anyhow::Result<String> {
        (self.0)(style, prompt)
    }
}

/// Whether the platform framework understands `PAM_BINARY_PROMPT`
pub fn has_binary_prompt() -> bool {
    cfg!(target_os = "linux")
}

/// One prompt sent to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvRequest {
    Text { style: Style, prompt: String },
    Binary(BinaryPrompt),
}

impl ConvRequest {
    pub fn text(style: Style, prompt: impl Into<String>) -> Self {
        ConvRequest::Text {
            style,
            prompt: prompt.into(),
        }
    }

    pub fn binary(prompt: BinaryPrompt) -> Self {
        ConvRequest::Binary(prompt)
    }

    pub fn style(&self) -> Style {
        match self {
            ConvRequest::Text { style, .. } => *style,
            ConvRequest::Binary(_) => Style::BinaryPrompt,
        }
    }
}

/// Answer to the request at the same position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvResponse {
    Text { style: Style, text: String },
    Binary(BinaryPrompt),
}

impl ConvResponse {
    /// Style of the request this answers
    pub fn style(&self) -> Style {
        match self {
            ConvResponse::Text { style, .. } => *style,
            ConvResponse::Binary(_) => Style::BinaryPrompt,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ConvResponse::Text { text, .. } => Some(text),
            ConvResponse::Binary(_) => None,
        }
    }

    pub fn binary(&self) -> Option<&BinaryPrompt> {
        match self {
            ConvResponse::Binary(prompt) => Some(prompt),
            ConvResponse::Text { .. } => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            ConvResponse::Text { text, .. } => Some(text),
            ConvResponse::Binary(_) => None,
        }
    }

    pub fn into_binary(self) -> Option<BinaryPrompt> {
        match self {
            ConvResponse::Binary(prompt) => Some(prompt),
            ConvResponse::Text { .. } => None,
        }
    }
}
