//! HTTP client for the Gemini `generateContent` API.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, warn};

use crate::chat::core::config::GeminiConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::llm::service::{
    GenerationFuture, GenerationRequest, GenerationResponse, GenerationService, ResponseStream,
};
use crate::llm::wire::{WireRequest, WireResponse, error_message};

const API_KEY_HEADER: &str = "x-goog-api-key";
const SSE_DATA_PREFIX: &str = "data:";

/// Gemini REST client.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl GeminiClient {
    /// Build a client from configuration.
    ///
    /// No whole-request timeout is set on the client itself so long streams
    /// are not cut; non-streaming calls apply `request_timeout` per request.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or the client cannot be built.
    pub fn new(config: &GeminiConfig) -> ChatResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ChatError::InvalidConfig("gemini.api_key is not set".to_string()))?;

        let mut key_value = HeaderValue::from_str(api_key)
            .map_err(|e| ChatError::InvalidConfig(format!("gemini.api_key: {e}")))?;
        key_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }

    async fn post(
        &self,
        url: &str,
        request: &GenerationRequest,
        timeout: Option<Duration>,
    ) -> ChatResult<reqwest::Response> {
        let body = WireRequest::from(request);
        let mut builder = self.client.post(url).json(&body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        debug!(
            "POST {url} ({} contents, search={})",
            request.contents.len(),
            request.enable_search
        );
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Generation service returned {status}");
            return Err(ChatError::HttpStatus {
                status: status.as_u16(),
                body: error_message(&text),
            });
        }
        Ok(response)
    }

    async fn generate_once(&self, request: GenerationRequest) -> ChatResult<GenerationResponse> {
        let url = self.endpoint(&request.model, "generateContent");
        let response = self.post(&url, &request, Some(self.request_timeout)).await?;
        let body: WireResponse = response.json().await?;
        body.into_response()
    }

    async fn open_stream(&self, request: GenerationRequest) -> ChatResult<ResponseStream> {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(&request.model, "streamGenerateContent")
        );
        let response = self.post(&url, &request, None).await?;

        let bytes = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other)),
        );
        let reader = tokio::io::BufReader::new(tokio_util::io::StreamReader::new(bytes));
        Ok(sse_responses(reader))
    }
}

impl GenerationService for GeminiClient {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> GenerationFuture<'_, ChatResult<GenerationResponse>> {
        Box::pin(self.generate_once(request))
    }

    fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> GenerationFuture<'_, ChatResult<ResponseStream>> {
        Box::pin(self.open_stream(request))
    }
}

/// Turn a server-sent-event body into a stream of partial responses.
///
/// The stream ends after the first error.
pub(crate) fn sse_responses<R>(reader: R) -> ResponseStream
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    let mut failed = false;
    let stream = LinesStream::new(reader.lines())
        .filter_map(|line| {
            futures::future::ready(match line {
                Ok(line) => decode_sse_line(&line),
                Err(e) => Some(Err(ChatError::Io(e))),
            })
        })
        .take_while(move |item| {
            let keep = !failed;
            failed = failed || item.is_err();
            futures::future::ready(keep)
        });
    Box::pin(stream)
}

/// Decode one SSE line. Non-data lines and keep-alives yield `None`.
pub(crate) fn decode_sse_line(line: &str) -> Option<ChatResult<GenerationResponse>> {
    let data = line.strip_prefix(SSE_DATA_PREFIX)?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(
        serde_json::from_str::<WireResponse>(data)
            .map_err(|e| ChatError::Stream(format!("invalid event payload: {e}")))
            .and_then(WireResponse::into_response),
    )
}
