//! Chat-completions client turning extracted text into structured chunks.

use crate::analyze::{AnalysisError, Chunk, ChunkAnalyzer, ChunkContext};
use crate::config::get_config;
use crate::pipeline::extract::SourceKind;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a document preprocessor for a search index. \
Split the provided source into retrieval-sized chunks and reply with a JSON object \
{\"chunks\": [...]}. Each chunk object may set: id, parentId, content, parentSummary, \
chunkSummary, codeExplanation, designIntent, handoverNotes, codeComments, paraCategory, \
fileType, language, framework, serviceDomain, isArchived, tags, relatedSection, fileName, \
filePath, url, chunkMeta, codeMetadata, involvedPeople, rawCode, relatedFiles. \
Always fill content and parentSummary. Reply with JSON only.";

/// HTTP client for the OpenAI-compatible analysis endpoint.
pub struct AnalysisClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl AnalysisClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, AnalysisError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("docpipe/0.1")
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.llm_endpoint.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.analysis_model.clone(),
        })
    }

    /// Accept either a bare JSON array or an object wrapping the list under `chunks`.
    fn parse_chunk_items(reply: &str) -> Result<Vec<Value>, AnalysisError> {
        let value: Value = serde_json::from_str(reply.trim())
            .map_err(|err| AnalysisError::MalformedReply(err.to_string()))?;

        match value {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => match map.remove("chunks") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(AnalysisError::MalformedReply(
                    "reply object has no 'chunks' array".to_string(),
                )),
            },
            _ => Err(AnalysisError::MalformedReply(
                "reply is neither an array nor an object".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ChunkAnalyzer for AnalysisClient {
    async fn analyze(
        &self,
        text: &str,
        kind: SourceKind,
        context: &ChunkContext,
    ) -> Result<Vec<Chunk>, AnalysisError> {
        let url = format!("{}/chat/completions", self.base_url);
        let user_prompt = format!(
            "Source file: {} (type: {})\n\n{}",
            context.file_name,
            kind.as_str(),
            text
        );
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt },
            ],
            "response_format": { "type": "json_object" },
        });

        let mut request = self.client.post(url).json(&body);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Analysis request failed");
            return Err(AnalysisError::UnexpectedStatus { status, body });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| AnalysisError::MalformedReply("reply has no choices".to_string()))?;

        let items = Self::parse_chunk_items(content)?;
        let chunks = items
            .iter()
            .map(|item| Chunk::from_value(item, context))
            .collect::<Vec<_>>();
        tracing::debug!(chunks = chunks.len(), kind = kind.as_str(), "Analysis reply parsed");
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn test_client(server: &MockServer) -> AnalysisClient {
        AnalysisClient {
            client: Client::builder()
                .user_agent("docpipe-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
            model: "test-analysis-model".into(),
        }
    }

    fn context() -> ChunkContext {
        ChunkContext {
            parent_id: "task-9".into(),
            file_name: "main.py".into(),
        }
    }

    #[tokio::test]
    async fn analyze_parses_wrapped_chunk_list() {
        let server = MockServer::start_async().await;
        let reply = json!({
            "choices": [{
                "message": {
                    "content": "{\"chunks\": [{\"id\": \"c-1\", \"content\": \"def main\", \"tags\": \"python, cli\"}]}"
                }
            }]
        });
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(reply.clone());
            })
            .await;

        let client = test_client(&server);
        let chunks = client
            .analyze("def main(): ...", SourceKind::Code, &context())
            .await
            .expect("analysis");

        mock.assert();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "c-1");
        assert_eq!(chunks[0].parent_id, "task-9");
        assert_eq!(chunks[0].file_name, "main.py");
        assert_eq!(chunks[0].tags, vec!["python", "cli"]);
    }

    #[tokio::test]
    async fn bare_array_reply_is_accepted() {
        let items = AnalysisClient::parse_chunk_items(r#"[{"content": "a"}, {"content": "b"}]"#)
            .expect("parse");
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn non_json_reply_is_malformed() {
        assert!(matches!(
            AnalysisClient::parse_chunk_items("Sorry, I cannot help."),
            Err(AnalysisError::MalformedReply(_))
        ));
    }
}
