use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, ShopVisionError};
use crate::gemini::{Candidate, Content, ContentGenerator, GenerateContentRequest, GenerateContentResponse, InlineData, Part};

/// Replays queued responses and records every request it receives.
#[derive(Default)]
pub struct Recorder {
    replies: Mutex<VecDeque<Result<GenerateContentResponse>>>,
    calls: Mutex<Vec<(String, GenerateContentRequest)>>,
}

impl Recorder {
    pub fn replying(replies: Vec<Result<GenerateContentResponse>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), calls: Mutex::default() })
    }

    pub fn calls(&self) -> Vec<(String, GenerateContentRequest)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ContentGenerator for Recorder {
    async fn generate_content(&self, model: &str, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        self.calls.lock().push((model.to_string(), request.clone()));
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ShopVisionError::Service("no reply queued".into())))
    }
}

pub fn parts_response(parts: Vec<Part>) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate { content: Some(Content { parts }), finish_reason: Some("STOP".into()) }],
        prompt_feedback: None,
    }
}

pub fn text_response(text: &str) -> GenerateContentResponse {
    parts_response(vec![Part::text(text)])
}

pub fn image_part(mime_type: &str, data: &str) -> Part {
    Part {
        text: None,
        inline_data: Some(InlineData { mime_type: mime_type.to_string(), data: data.to_string() }),
    }
}
