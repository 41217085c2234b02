//! LLM-assisted prompt rewriting over an OpenAI-compatible chat API.
//!
//! The model answers with the rewritten text or the bare `NO_CHANGE`
//! sentinel. The sentinel is turned into [`RewriteOutcome::Unchanged`] here
//! and never travels further; any other reply must pass
//! [`validate::check_generated`] before it can be written.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::runner::{Preview, PreviewChange};
use super::store::{PromptStore, PromptStoreError};
use super::transforms::NO_CHANGE_SENTINEL;
use super::validate::{self, Violation};
use crate::config::RewriterSettings;
use crate::models::{PromptField, PromptPatch};

const GENDER_PROMPT: &str = r#"You edit prompts for an image generator. Rewrite the text so that every person in it is female: change male nouns, pronouns and titles to their female forms. Keep everything else exactly as written, including punctuation, style keywords and parameters.

If nothing needs to change, reply with exactly NO_CHANGE.
Reply with ONLY the rewritten text. No quotes, no explanations."#;

const TRANSLATE_PROMPT: &str = r#"You edit prompts for an image generator. If the text is not in English, translate it to natural English, keeping style keywords, names and parameters as they are.

If the text is already in English, reply with exactly NO_CHANGE.
Reply with ONLY the translated text. No quotes, no explanations."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RewriteMode {
    /// Convert people in the prompt to female
    Gender,
    /// Translate non-English prompts to English
    Translate,
}

impl RewriteMode {
    fn system_prompt(&self) -> &'static str {
        match self {
            Self::Gender => GENDER_PROMPT,
            Self::Translate => TRANSLATE_PROMPT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RewriteOutcome {
    Rewritten(String),
    Unchanged,
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("LLM API key not configured")]
    NotConfigured,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rejected model output: {0}")]
    Rejected(Violation),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct PromptRewriter {
    client: Client,
    settings: RewriterSettings,
    api_key: String,
}

impl PromptRewriter {
    pub fn new(client: Client, settings: &RewriterSettings) -> Result<Self, RewriteError> {
        let api_key = settings.api_key.clone().ok_or(RewriteError::NotConfigured)?;
        Ok(Self {
            client,
            settings: settings.clone(),
            api_key,
        })
    }

    /// Rewrite one piece of text.
    pub async fn rewrite(
        &self,
        mode: RewriteMode,
        text: &str,
    ) -> Result<RewriteOutcome, RewriteError> {
        let reply = self.complete(mode.system_prompt(), text).await?;
        interpret(text, &reply)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, RewriteError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.settings.endpoint.trim_end_matches('/')
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RewriteError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RewriteError::Api(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RewriteError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RewriteError::Parse("response has no content".to_string()))
    }
}

/// Turn a raw model reply into an outcome.
pub fn interpret(input: &str, reply: &str) -> Result<RewriteOutcome, RewriteError> {
    let cleaned = reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '`' || c == '\u{201c}' || c == '\u{201d}')
        .trim();

    if cleaned == NO_CHANGE_SENTINEL
        || cleaned.trim_end_matches(['.', '!']) == NO_CHANGE_SENTINEL
        || cleaned == input.trim()
    {
        return Ok(RewriteOutcome::Unchanged);
    }

    validate::check_generated(input, cleaned).map_err(RewriteError::Rejected)?;
    Ok(RewriteOutcome::Rewritten(cleaned.to_string()))
}

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub mode: RewriteMode,
    pub dry_run: bool,
    /// Stop after this many active rows (0 = no limit).
    pub limit: usize,
    pub batch_size: usize,
    /// Pause between model calls.
    pub delay: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewriteReport {
    pub scanned: usize,
    pub rewritten: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Would-be changes, collected on dry runs only.
    pub previews: Vec<Preview>,
}

/// Run the rewriter over active rows, one model call at a time.
pub async fn rewrite_prompts(
    store: &dyn PromptStore,
    rewriter: &PromptRewriter,
    options: &RewriteOptions,
) -> Result<RewriteReport, PromptStoreError> {
    let mut report = RewriteReport::default();
    let batch_size = options.batch_size.max(1);
    let mut offset = 0;

    'pages: loop {
        let page = store.fetch_page(offset, batch_size).await?;
        if page.is_empty() {
            break;
        }

        for row in page.iter().filter(|r| r.is_active) {
            if options.limit > 0 && report.scanned >= options.limit {
                break 'pages;
            }
            report.scanned += 1;

            let mut patch = PromptPatch::default();
            let mut changes = Vec::new();
            for field in PromptField::ALL {
                let text = row.field(field);
                if text.trim().is_empty() {
                    continue;
                }
                match rewriter.rewrite(options.mode, text).await {
                    Ok(RewriteOutcome::Rewritten(new)) => {
                        if options.dry_run {
                            changes.push(PreviewChange::Field {
                                field,
                                before: text.to_string(),
                                after: new.clone(),
                            });
                        }
                        patch.set(field, new);
                    }
                    Ok(RewriteOutcome::Unchanged) => {}
                    Err(RewriteError::Rejected(v)) => {
                        warn!("Row {} {}: rejected model output: {}", row.id, field.as_str(), v);
                        report.rejected += 1;
                    }
                    Err(e) => {
                        warn!("Row {} {}: {}", row.id, field.as_str(), e);
                        report.failed += 1;
                    }
                }
                tokio::time::sleep(options.delay).await;
            }

            if patch.is_empty() {
                report.unchanged += 1;
                continue;
            }
            debug!("Row {} rewritten: {:?}", row.id, patch);
            if options.dry_run {
                report.previews.push(Preview { id: row.id, changes });
            } else {
                store.update(row.id, &patch).await?;
            }
            report.rewritten += 1;
        }

        offset += page.len();
        if page.len() < batch_size {
            break;
        }
    }

    info!(
        "Rewrite: {} scanned, {} rewritten, {} unchanged, {} rejected, {} failed",
        report.scanned, report.rewritten, report.unchanged, report.rejected, report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::store::{prompt, MemoryPromptStore};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn settings(endpoint: String) -> RewriterSettings {
        RewriterSettings {
            endpoint,
            api_key: Some("sk-test".into()),
            model: "test-model".into(),
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    #[test]
    fn test_interpret_sentinel_is_unchanged() {
        assert_eq!(interpret("a cat", "NO_CHANGE").unwrap(), RewriteOutcome::Unchanged);
        assert_eq!(interpret("a cat", " \"NO_CHANGE.\" ").unwrap(), RewriteOutcome::Unchanged);
        assert_eq!(interpret("a cat", "a cat").unwrap(), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_interpret_rejects_bad_output() {
        assert!(matches!(
            interpret("a man", "a woman NO_CHANGE"),
            Err(RewriteError::Rejected(Violation::Sentinel))
        ));
        assert!(matches!(
            interpret("a man", "a $1woman"),
            Err(RewriteError::Rejected(Violation::Backref('1')))
        ));
    }

    #[test]
    fn test_interpret_strips_quotes() {
        assert_eq!(
            interpret("a man", "\"a woman\"").unwrap(),
            RewriteOutcome::Rewritten("a woman".into())
        );
    }

    #[test]
    fn test_missing_key() {
        let mut s = settings("http://localhost".into());
        s.api_key = None;
        assert!(matches!(
            PromptRewriter::new(Client::new(), &s),
            Err(RewriteError::NotConfigured)
        ));
    }

    /// A model that swaps `man` for `woman` and otherwise says NO_CHANGE.
    async fn gender_model() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(|req: &Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let text = body["messages"][1]["content"].as_str().unwrap_or_default();
                let reply = if text.contains("man") {
                    text.replace("man", "woman")
                } else {
                    "NO_CHANGE".to_string()
                };
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": reply}}]}))
            })
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_rewrite_prompts_end_to_end() {
        let server = gender_model().await;

        let store = MemoryPromptStore::new(vec![
            prompt(1, "Sunset", "a man at sunset"),
            prompt(2, "Cat", "a cat"),
        ]);
        let rewriter = PromptRewriter::new(Client::new(), &settings(server.uri())).unwrap();
        let options = RewriteOptions {
            mode: RewriteMode::Gender,
            dry_run: false,
            limit: 0,
            batch_size: 10,
            delay: Duration::ZERO,
        };

        let report = rewrite_prompts(&store, &rewriter, &options).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.rewritten, 1);
        assert_eq!(report.unchanged, 1);

        let rows = store.rows();
        assert_eq!(rows[0].prompt, "a woman at sunset");
        // The sentinel never reaches the data.
        assert_eq!(rows[1].prompt, "a cat");
    }

    #[tokio::test]
    async fn test_dry_run_collects_previews() {
        let server = gender_model().await;
        let store = MemoryPromptStore::new(vec![
            prompt(1, "Sunset", "a man at sunset"),
            prompt(2, "Cat", "a cat"),
        ]);
        let rewriter = PromptRewriter::new(Client::new(), &settings(server.uri())).unwrap();
        let options = RewriteOptions {
            mode: RewriteMode::Gender,
            dry_run: true,
            limit: 0,
            batch_size: 10,
            delay: Duration::ZERO,
        };

        let report = rewrite_prompts(&store, &rewriter, &options).await.unwrap();
        assert_eq!(report.rewritten, 1);
        assert_eq!(
            report.previews,
            vec![Preview {
                id: 1,
                changes: vec![PreviewChange::Field {
                    field: PromptField::Prompt,
                    before: "a man at sunset".into(),
                    after: "a woman at sunset".into(),
                }],
            }]
        );
        assert_eq!(store.rows()[0].prompt, "a man at sunset");
    }
}
