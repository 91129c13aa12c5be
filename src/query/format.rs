use super::{AnswerResponse, RetrievedResult};
use crate::Result;

/// Characters of each chunk shown in the context block
const CONTEXT_PREVIEW_CHARS: usize = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Answer text only
    #[default]
    Plain,
    /// Answer followed by a numbered context block
    Context,
    /// Pretty-printed `{answer, contexts}` JSON
    Json,
}

impl OutputFormat {
    /// `json` takes precedence and implies context display
    #[inline]
    pub fn from_flags(show_context: bool, json_context: bool) -> Self {
        if json_context {
            Self::Json
        } else if show_context {
            Self::Context
        } else {
            Self::Plain
        }
    }
}

#[inline]
pub fn render(response: &AnswerResponse, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Plain => Ok(response.answer.clone()),
        OutputFormat::Context => Ok(format!(
            "{}\n\n--- CONTEXT ---\n{}",
            response.answer,
            format_contexts(&response.contexts)
        )),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
    }
}

fn format_contexts(contexts: &[RetrievedResult]) -> String {
    contexts
        .iter()
        .map(|result| {
            let preview: String = result
                .text
                .chars()
                .take(CONTEXT_PREVIEW_CHARS)
                .map(|c| if c == '\n' { ' ' } else { c })
                .collect();
            format!(
                "[{}] score={} src={}\n{}\n",
                result.rank, result.score, result.metadata.file_path, preview
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
