//! Paper text extraction through the model endpoint.
//!
//! The PDF goes up as a base64 `document` content block together with a
//! short instruction, and the first text block of the answer is the text.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use paperdesk_core::document::PdfUpload;
use paperdesk_core::error::ExtractionError;
use paperdesk_core::message::{ApiMessage, ContentBlock, MessagesRequest};
use paperdesk_core::ModelClient;
use tracing::{debug, info};

pub const EXTRACTION_INSTRUCTION: &str =
    "Please extract the full text content of this research paper. I need the complete text for analysis.";

pub struct TextExtractor {
    client: Arc<dyn ModelClient>,
    model: String,
    max_tokens: u32,
}

impl TextExtractor {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
        }
    }

    /// The request sent for `upload`.
    pub fn build_request(&self, upload: &PdfUpload) -> MessagesRequest {
        let data = STANDARD.encode(upload.bytes());
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![ApiMessage::user_blocks(vec![
                ContentBlock::base64_document(upload.media_type(), data),
                ContentBlock::Text {
                    text: EXTRACTION_INSTRUCTION.into(),
                },
            ])],
        }
    }

    pub async fn extract(&self, upload: &PdfUpload) -> Result<String, ExtractionError> {
        debug!(
            file = %upload.file_name(),
            bytes = upload.bytes().len(),
            client = self.client.name(),
            "Extracting paper text"
        );

        let response = self.client.complete(self.build_request(upload)).await?;
        let text = response.first_text().unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyResult);
        }

        info!(file = %upload.file_name(), chars = text.len(), "Paper text extracted");
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use paperdesk_core::error::UpstreamError;
    use paperdesk_core::message::MessagesResponse;
    use std::sync::Mutex;

    struct CannedClient {
        reply: std::result::Result<serde_json::Value, UpstreamError>,
        seen: Mutex<Vec<MessagesRequest>>,
    }

    #[async_trait]
    impl ModelClient for CannedClient {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: MessagesRequest) -> std::result::Result<MessagesResponse, UpstreamError> {
            self.seen.lock().unwrap().push(request);
            self.reply
                .clone()
                .map(|v| serde_json::from_value(v).unwrap())
        }
    }

    fn upload() -> PdfUpload {
        PdfUpload::new("paper.pdf", "application/pdf", b"%PDF-1.4 test".to_vec()).unwrap()
    }

    fn extractor(reply: std::result::Result<serde_json::Value, UpstreamError>) -> (Arc<CannedClient>, TextExtractor) {
        let client = Arc::new(CannedClient {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        let ex = TextExtractor::new(client.clone(), "claude-sonnet-4-20250514", 4000);
        (client, ex)
    }

    #[tokio::test]
    async fn sends_document_block_and_instruction() {
        let (client, ex) = extractor(Ok(serde_json::json!({
            "content": [{"type": "text", "text": "Full paper text"}]
        })));

        let text = ex.extract(&upload()).await.unwrap();
        assert_eq!(text, "Full paper text");

        let seen = client.seen.lock().unwrap();
        let body = serde_json::to_value(&seen[0]).unwrap();
        assert_eq!(body["max_tokens"], 4000);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "document");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "application/pdf");
        assert_eq!(content[0]["source"]["data"], STANDARD.encode(b"%PDF-1.4 test"));
        assert_eq!(content[1]["text"], EXTRACTION_INSTRUCTION);
    }

    #[tokio::test]
    async fn empty_text_is_an_error() {
        let (_, ex) = extractor(Ok(serde_json::json!({"content": [{"type": "text", "text": "  "}]})));
        assert!(matches!(ex.extract(&upload()).await, Err(ExtractionError::EmptyResult)));
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let (_, ex) = extractor(Ok(serde_json::json!({"content": []})));
        assert!(matches!(ex.extract(&upload()).await, Err(ExtractionError::EmptyResult)));
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let (_, ex) = extractor(Err(UpstreamError::Status {
            status_code: 529,
            body: "overloaded".into(),
        }));
        let err = ex.extract(&upload()).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Upstream(UpstreamError::Status { status_code: 529, .. })
        ));
    }
}
