//! Deterministic model and embedder doubles shared by unit tests.

use crate::app::AppContext;
use crate::auth::UserStore;
use crate::config::Settings;
use crate::conversation::{MemoryCheckpointStore, Message, ToolCallRequest};
use crate::embedding::Embedder;
use crate::error::{RagChatError, Result};
use crate::llm::{LanguageModel, ModelReply, ToolSpec};
use crate::vector_store::MemoryVectorStore;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bag-of-words embedder: texts sharing words get similar vectors.
pub struct HashEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            v[(hasher.finish() as usize) % self.dimensions] += 1.0;
        }
        // keep empty-ish texts off the origin so cosine stays defined
        v[0] += 0.01;
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(RagChatError::InvalidInput("Cannot embed empty text".into()));
        }
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embedder that fails for any text containing `marker`.
pub struct FailingEmbedder {
    inner: HashEmbedder,
    marker: String,
}

impl FailingEmbedder {
    pub fn new(dimensions: usize, marker: &str) -> Self {
        Self {
            inner: HashEmbedder::new(dimensions),
            marker: marker.to_string(),
        }
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(&self.marker) {
            return Err(RagChatError::unavailable("embedding service", "rate limited"));
        }
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Model that replays a queue of replies, then falls back to a fixed behaviour.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    fallback: Option<ToolCallRequest>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self::from_results(replies.into_iter().map(Ok).collect())
    }

    pub fn from_results(replies: Vec<Result<ModelReply>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A model that requests `request` on every step and never answers.
    pub fn always_calling(request: ToolCallRequest) -> Self {
        let mut model = Self::new(Vec::new());
        model.fallback = Some(request);
        model
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Histories passed to each generate call, in order.
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(
        &self,
        _system_prompt: &str,
        history: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<ModelReply> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(history.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        match &self.fallback {
            Some(request) => {
                let mut request = request.clone();
                request.id = format!("{}_{}", request.id, n);
                Ok(ModelReply::calls(vec![request]))
            }
            None => Ok(ModelReply::text("done")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// In-memory application context around a scripted model.
pub fn test_context(settings: Settings, model: ScriptedModel) -> AppContext {
    AppContext::from_parts(
        settings,
        Arc::new(MemoryVectorStore::new()),
        Arc::new(HashEmbedder::new(16)),
        Arc::new(model),
        Arc::new(MemoryCheckpointStore::new()),
        UserStore::in_memory().unwrap(),
    )
    .unwrap()
}
