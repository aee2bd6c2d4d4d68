// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock collaborators: responder, fact extractor, and contact directory.
//!
//! Each mock records how it was called so tests can assert on whether the
//! pipeline reached it, and can be switched into a failing mode.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::traits::collaborator::{ContactDirectory, FactExtractor, Responder};
use parley_core::types::{
    Channel, ContactProfile, Conversation, ConversationFacts, Message, ResponseRequest,
};
use parley_core::ParleyError;

/// A responder that returns queued replies.
///
/// When the queue is empty the default reply is used; `None` means the
/// responder stays silent.
pub struct MockResponder {
    replies: Arc<Mutex<VecDeque<Option<String>>>>,
    default_reply: Option<String>,
    requests: Arc<Mutex<Vec<ResponseRequest>>>,
    failing: AtomicBool,
}

impl MockResponder {
    /// Always answers with `text` unless a reply was queued.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_default(Some(text.into()))
    }

    /// Never answers.
    pub fn silent() -> Self {
        Self::with_default(None)
    }

    /// Every call returns an error.
    pub fn failing() -> Self {
        let mock = Self::silent();
        mock.failing.store(true, Ordering::SeqCst);
        mock
    }

    fn with_default(default_reply: Option<String>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            default_reply,
            requests: Arc::new(Mutex::new(Vec::new())),
            failing: AtomicBool::new(false),
        }
    }

    pub async fn queue_reply(&self, reply: Option<String>) {
        self.replies.lock().await.push_back(reply);
    }

    /// Requests received so far, in call order.
    pub async fn requests(&self) -> Vec<ResponseRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn respond(&self, request: ResponseRequest) -> Result<Option<String>, ParleyError> {
        self.requests.lock().await.push(request);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ParleyError::Responder {
                message: "mock responder failure".to_string(),
                source: None,
            });
        }
        let queued = self.replies.lock().await.pop_front();
        Ok(queued.unwrap_or_else(|| self.default_reply.clone()))
    }
}

/// A fact extractor that returns fixed facts.
pub struct MockFactExtractor {
    facts: Option<ConversationFacts>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MockFactExtractor {
    pub fn returning(facts: ConversationFacts) -> Self {
        Self {
            facts: Some(facts),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Extracts nothing; stored facts stay untouched.
    pub fn empty() -> Self {
        Self {
            facts: None,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactExtractor for MockFactExtractor {
    async fn extract(
        &self,
        _conversation: &Conversation,
        _transcript: &[Message],
    ) -> Result<Option<ConversationFacts>, ParleyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ParleyError::Internal("mock fact extraction failure".to_string()));
        }
        Ok(self.facts.clone())
    }
}

/// A contact directory backed by a handle-keyed map.
#[derive(Default)]
pub struct MockContactDirectory {
    profiles: HashMap<String, ContactProfile>,
    lookups: AtomicUsize,
    failing: AtomicBool,
}

impl MockContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, handle: impl Into<String>, profile: ContactProfile) -> Self {
        self.profiles.insert(handle.into(), profile);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactDirectory for MockContactDirectory {
    async fn lookup(
        &self,
        _channel: Channel,
        handle: &str,
    ) -> Result<Option<ContactProfile>, ParleyError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ParleyError::Internal("mock directory unavailable".to_string()));
        }
        Ok(self.profiles.get(handle).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::{HistoryEntry, Role};

    fn request(content: &str) -> ResponseRequest {
        ResponseRequest {
            conversation_id: "c1".to_string(),
            agent_id: "sales".to_string(),
            model: "m".to_string(),
            tools: Vec::new(),
            content: content.to_string(),
            history: vec![HistoryEntry {
                role: Role::User,
                content: content.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn queued_replies_take_precedence() {
        let responder = MockResponder::replying("default");
        responder.queue_reply(None).await;
        assert_eq!(responder.respond(request("a")).await.unwrap(), None);
        assert_eq!(
            responder.respond(request("b")).await.unwrap().as_deref(),
            Some("default")
        );
        assert_eq!(responder.call_count().await, 2);
        assert_eq!(responder.requests().await[1].content, "b");
    }

    #[tokio::test]
    async fn failing_responder_records_the_call() {
        let responder = MockResponder::failing();
        assert!(responder.respond(request("x")).await.is_err());
        assert_eq!(responder.call_count().await, 1);
    }

    #[tokio::test]
    async fn directory_returns_known_profiles() {
        let directory = MockContactDirectory::new().with_profile(
            "5512345678",
            ContactProfile {
                name: Some("Ana".to_string()),
                avatar_url: None,
                lifetime_value: 12.5,
            },
        );
        let found = directory.lookup(Channel::Wa, "5512345678").await.unwrap();
        assert_eq!(found.unwrap().name.as_deref(), Some("Ana"));
        assert!(directory.lookup(Channel::Wa, "0000000000").await.unwrap().is_none());
        assert_eq!(directory.lookups(), 2);
    }
}
