use crate::error::{MailboxError, MailboxResult};
use crate::registry::Registry;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub content: String,
    /// Producer wall clock, Unix nanoseconds. Informational only.
    pub timestamp: i64,
}

impl Message {
    fn new(from: &str, to: &str, content: &str) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4()),
            from: from.to_string(),
            to: to.to_string(),
            content: content.to_string(),
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        }
    }
}

/// Outcome of a successful `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Message(Message),
    /// The wait elapsed with nothing to deliver.
    TimedOut,
}

impl Registry {
    /// Registers a new message and enqueues it for `to`.
    ///
    /// Never blocks. If the recipient's mailbox is full the registration is
    /// rolled back and `QueueFull` is returned.
    pub fn send(&self, from: &str, to: &str, content: &str) -> MailboxResult<String> {
        if from.is_empty() || to.is_empty() || content.is_empty() {
            return Err(MailboxError::Validation("from, to, and content are required"));
        }
        if self.is_shutting_down() {
            return Err(MailboxError::Shutdown);
        }

        let msg = Message::new(from, to, content);
        let id = msg.id.clone();

        self.register_message(msg.clone())?;
        let mailbox = match self.get_or_create_mailbox(to) {
            Ok(mailbox) => mailbox,
            Err(e) => {
                self.delete_message(&id)?;
                return Err(e);
            }
        };

        if mailbox.try_push(msg).is_err() {
            self.delete_message(&id)?;
            tracing::warn!(from, to, capacity = mailbox.capacity(), "mailbox full, message rejected");
            return Err(MailboxError::QueueFull);
        }

        tracing::debug!(message_id = %id, from, to, "message queued");
        Ok(id)
    }

    /// Waits for the next message addressed to `agent`.
    ///
    /// Resolves on whichever comes first: a message, the optional `wait`
    /// elapsing, or shutdown. With `wait` of `None` only the other two apply.
    /// A delivered message stays registered until it is acknowledged.
    pub async fn get(&self, agent: &str, wait: Option<Duration>) -> MailboxResult<Delivery> {
        if agent.is_empty() {
            return Err(MailboxError::Validation("agent_name is required"));
        }
        if self.is_shutting_down() {
            return Err(MailboxError::Shutdown);
        }

        let mailbox = self.get_or_create_mailbox(agent)?;
        let timer = async {
            match wait {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            () = self.shutdown_token().cancelled() => {
                tracing::debug!(agent, "get aborted by shutdown");
                Err(MailboxError::Shutdown)
            }
            received = mailbox.recv() => match received {
                Some(msg) => {
                    tracing::debug!(agent, message_id = %msg.id, "message delivered");
                    Ok(Delivery::Message(msg))
                }
                // The registry keeps a sender alive, so the queue never closes.
                None => Err(MailboxError::Shutdown),
            },
            () = timer => {
                tracing::debug!(agent, ?wait, "get timed out");
                Ok(Delivery::TimedOut)
            }
        }
    }

    /// Removes an unacknowledged message. Not repeatable: a second ack of
    /// the same id yields `NotFound`.
    pub fn ack(&self, message_id: &str) -> MailboxResult<()> {
        if message_id.is_empty() {
            return Err(MailboxError::Validation("message_id is required"));
        }
        if self.is_shutting_down() {
            return Err(MailboxError::Shutdown);
        }

        if !self.delete_message(message_id)? {
            return Err(MailboxError::NotFound);
        }
        tracing::debug!(message_id, "message acknowledged");
        Ok(())
    }
}
