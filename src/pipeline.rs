//! Prompt → model → output parser pipeline.
//!
//! The three stages are composed explicitly: [`Pipeline::stream`] formats the
//! prompt, hands the messages to the model client and wraps the resulting
//! event stream in the text parser.

use std::pin::Pin;

use futures::{Stream, StreamExt, future};
use thiserror::Error;
use tracing::debug;

use crate::llm::{ChatStream, LLMError, Message, ModelClient, Role, StreamEvent};

/// System instruction used by every session.
pub const HISTORIAN_INSTRUCTION: &str = "You're a very knowledgeable historian who provides accurate and eloquent answers to historical questions.";

/// A lazily produced, ordered sequence of response fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing prompt variable '{0}'")]
    MissingVariable(String),

    #[error(transparent)]
    Llm(#[from] LLMError),
}

// ============================================================================
// PromptTemplate
// ============================================================================

/// Ordered role/template pairs with `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    messages: Vec<(Role, String)>,
}

impl PromptTemplate {
    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = (Role, S)>,
        S: Into<String>,
    {
        Self {
            messages: messages
                .into_iter()
                .map(|(role, text)| (role, text.into()))
                .collect(),
        }
    }

    /// The historian system prompt followed by the user's question.
    pub fn historian() -> Self {
        Self::from_messages([
            (Role::System, HISTORIAN_INSTRUCTION),
            (Role::User, "{question}"),
        ])
    }

    pub fn format(&self, variables: &[(&str, &str)]) -> Result<Vec<Message>, PipelineError> {
        self.messages
            .iter()
            .map(|(role, template)| {
                substitute(template, variables).map(|content| Message::new(*role, content))
            })
            .collect()
    }
}

fn substitute(template: &str, variables: &[(&str, &str)]) -> Result<String, PipelineError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            // Unclosed brace, keep it literal
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let name = &after[..end];
        let value = variables
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| PipelineError::MissingVariable(name.to_string()))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

// ============================================================================
// TextOutputParser
// ============================================================================

/// Extracts the plain text fragments from a chat event stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextOutputParser;

impl TextOutputParser {
    pub fn parse(&self, events: ChatStream) -> FragmentStream {
        Box::pin(events.filter_map(|event| {
            future::ready(match event {
                Ok(StreamEvent::Token(text)) => Some(Ok(text)),
                Ok(StreamEvent::Done { usage }) => {
                    if let Some(usage) = usage {
                        debug!(
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            "stream finished"
                        );
                    }
                    None
                }
                Err(e) => Some(Err(e)),
            })
        }))
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug)]
pub struct Pipeline {
    prompt: PromptTemplate,
    model: ModelClient,
    parser: TextOutputParser,
}

impl Pipeline {
    pub fn new(prompt: PromptTemplate, model: ModelClient, parser: TextOutputParser) -> Self {
        Self {
            prompt,
            model,
            parser,
        }
    }

    pub fn model(&self) -> &ModelClient {
        &self.model
    }

    /// Run the pipeline for one question.
    pub async fn stream(&self, question: &str) -> Result<FragmentStream, PipelineError> {
        let messages = self.prompt.format(&[("question", question)])?;
        let events = self.model.stream(messages).await?;
        Ok(self.parser.parse(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use std::sync::Arc;

    #[test]
    fn test_historian_prompt_format() {
        let messages = PromptTemplate::historian()
            .format(&[("question", "Who was Cleopatra?")])
            .unwrap();
        assert_eq!(
            messages,
            vec![
                Message::new(Role::System, HISTORIAN_INSTRUCTION),
                Message::new(Role::User, "Who was Cleopatra?"),
            ]
        );
    }

    #[test]
    fn test_missing_variable() {
        let err = PromptTemplate::historian().format(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingVariable(name) if name == "question"));
    }

    #[test]
    fn test_substitute_keeps_unclosed_brace_and_value_braces() {
        assert_eq!(substitute("a {b", &[]).unwrap(), "a {b");
        // Substituted values are not re-scanned
        assert_eq!(
            substitute("q: {question}!", &[("question", "{x}")]).unwrap(),
            "q: {x}!"
        );
    }

    #[tokio::test]
    async fn test_stream_passes_question_and_extracts_text() {
        let provider = Arc::new(ScriptedProvider::new(&["The ", "Nile."]));
        let model = ModelClient::new(provider.clone(), "test-model").with_temperature(Some(0.5));
        let pipeline = Pipeline::new(PromptTemplate::historian(), model, TextOutputParser);

        let fragments: Vec<String> = pipeline
            .stream("Which river?")
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["The ", "Nile."]);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test-model");
        assert_eq!(requests[0].temperature, Some(0.5));
        assert_eq!(requests[0].messages[1].content, "Which river?");
    }

    #[tokio::test]
    async fn test_parser_passes_errors_through() {
        let provider = Arc::new(ScriptedProvider::failing_after(&["partial"], 502));
        let pipeline = Pipeline::new(
            PromptTemplate::historian(),
            ModelClient::new(provider, "m"),
            TextOutputParser,
        );

        let items: Vec<_> = pipeline.stream("q").await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(
            items[1],
            Err(LLMError::Api { status: 502, .. })
        ));
    }
}
