use std::sync::Arc;

use async_trait::async_trait;

use crate::api::SlackApi;
use crate::error::SlackApiError;
use crate::events::ReplyTarget;

/// Outbound replies. Callers treat failures as best-effort and only log them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &ReplyTarget, text: &str) -> Result<(), SlackApiError>;
}

pub struct SlackNotifier {
    api: Arc<SlackApi>,
}

impl SlackNotifier {
    pub fn new(api: Arc<SlackApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, target: &ReplyTarget, text: &str) -> Result<(), SlackApiError> {
        self.api.post_message(target.conversation_id(), text).await
    }
}
