//! Chat service: one conversation turn from checkpoint load to checkpoint save.

use crate::agent::{Agent, AgentResponse};
use crate::conversation::{CheckpointStore, ConversationState, Message};
use crate::error::{RagChatError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// The answer to a turn and the thread it was recorded in.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub thread_id: String,
    pub response: AgentResponse,
}

/// A thread's entry in the lock table. Dropping it removes the entry once no other
/// turn holds or waits on it, including when the turn future is cancelled.
struct ThreadLease<'a> {
    locks: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    thread_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for ThreadLease<'_> {
    fn drop(&mut self) {
        if let Ok(mut locks) = self.locks.lock() {
            // one reference in the table, one here: nobody else is waiting
            if Arc::strong_count(&self.lock) == 2 {
                locks.remove(&self.thread_id);
            }
        }
    }
}

/// Runs turns against stored conversations.
///
/// Turns on one thread run one at a time; different threads run concurrently. The
/// checkpoint only moves forward when a turn completes, so a failed, timed-out or
/// cancelled turn leaves the previous state in place.
pub struct ChatService {
    agent: Agent,
    checkpoints: Arc<dyn CheckpointStore>,
    turn_timeout: Option<Duration>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatService {
    pub fn new(agent: Agent, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            agent,
            checkpoints,
            turn_timeout: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    fn thread_lease(&self, thread_id: &str) -> Result<ThreadLease<'_>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| RagChatError::Checkpoint("thread lock table poisoned".into()))?;
        let lock = locks.entry(thread_id.to_string()).or_default().clone();
        Ok(ThreadLease {
            locks: &self.locks,
            thread_id: thread_id.to_string(),
            lock,
        })
    }

    /// Append the user messages to the thread and run the agent until it answers.
    ///
    /// The thread defaults to `user_id`.
    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    pub async fn handle_turn(
        &self,
        user_id: &str,
        thread_id: Option<&str>,
        messages: Vec<String>,
    ) -> Result<TurnReply> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(RagChatError::InvalidInput("user_id must not be empty".into()));
        }
        let messages: Vec<String> = messages
            .into_iter()
            .filter(|m| !m.trim().is_empty())
            .collect();
        if messages.is_empty() {
            return Err(RagChatError::InvalidInput("message must not be empty".into()));
        }
        let thread_id = thread_id
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(user_id)
            .to_string();

        let lease = self.thread_lease(&thread_id)?;
        let _turn = lease.lock.lock().await;
        let result = self.run_locked(user_id, &thread_id, messages).await;
        result
    }

    async fn run_locked(
        &self,
        user_id: &str,
        thread_id: &str,
        messages: Vec<String>,
    ) -> Result<TurnReply> {
        let mut state = self
            .checkpoints
            .load(thread_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(thread_id, user_id));
        if state.user_id() != user_id {
            return Err(RagChatError::Auth("Thread belongs to another user.".into()));
        }

        info!("Turn started on thread {} ({} prior messages)", thread_id, state.len());
        for message in messages {
            state.push(Message::user(message));
        }

        let response = match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, self.agent.run(&mut state))
                .await
                .map_err(|_| RagChatError::TurnTimedOut(limit.as_secs()))?,
            None => self.agent.run(&mut state).await,
        }
        .inspect_err(|e| warn!("Turn on thread {} failed: {}", thread_id, e))?;

        self.checkpoints.save(&state).await?;
        info!(
            "Turn finished on thread {}: {} generate step(s), {} tool call(s)",
            thread_id,
            response.iterations,
            response.tool_calls.len()
        );

        Ok(TurnReply {
            thread_id: thread_id.to_string(),
            response,
        })
    }

    /// Stored state of a thread.
    pub async fn history(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        self.checkpoints.load(thread_id).await
    }

    /// Forget a thread. Returns whether it existed.
    pub async fn reset(&self, thread_id: &str) -> Result<bool> {
        let lease = self.thread_lease(thread_id)?;
        let _turn = lease.lock.lock().await;
        let deleted = self.checkpoints.delete(thread_id).await;
        deleted
    }
}
