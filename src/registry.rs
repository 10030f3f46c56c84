use crate::error::{MailboxError, MailboxResult};
use crate::messages::Message;
use async_channel::{Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Bounded FIFO of undelivered messages for one agent.
///
/// Cloning yields another handle to the same queue. Any number of handles
/// may receive concurrently; each message is handed to exactly one of them.
#[derive(Clone, Debug)]
pub struct Mailbox {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Enqueues without waiting. A full queue hands the message back.
    pub fn try_push(&self, msg: Message) -> Result<(), Message> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(m) | TrySendError::Closed(m) => m,
        })
    }

    /// Waits for the head of the queue. Cancel-safe: dropping the future
    /// never loses a message.
    pub async fn recv(&self) -> Option<Message> {
        self.rx.recv().await.ok()
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(usize::MAX)
    }

    /// True when both handles refer to the same underlying queue.
    #[cfg(test)]
    pub(crate) fn same_queue(&self, other: &Mailbox) -> bool {
        self.tx.same_channel(&other.tx)
    }
}

/// Undelivered messages still sitting in mailboxes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Backlog {
    pub queued: usize,
    /// Agents with at least one undelivered message.
    pub agents: usize,
}

#[derive(Default)]
struct State {
    // key: message id, present until acknowledged
    messages: HashMap<String, Message>,
    // key: recipient agent name
    mailboxes: HashMap<String, Mailbox>,
}

/// In-memory message registry and per-agent mailboxes.
///
/// The lock only guards map access and is never held across an await.
/// Mailboxes are never reclaimed, so memory grows with the number of
/// distinct agent names seen over the process lifetime.
pub struct Registry {
    state: Mutex<State>,
    capacity: usize,
    shutdown: CancellationToken,
}

impl Registry {
    pub fn new(capacity: usize, shutdown: CancellationToken) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity: capacity.max(1),
            shutdown,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn with_state<F, T>(&self, f: F) -> MailboxResult<T>
    where
        F: FnOnce(&mut State) -> T,
    {
        let mut state = self.state.lock().map_err(|_| MailboxError::Lock)?;
        Ok(f(&mut *state))
    }

    pub fn register_message(&self, msg: Message) -> MailboxResult<()> {
        self.with_state(|s| {
            s.messages.insert(msg.id.clone(), msg);
        })
    }

    /// Returns whether an entry was removed.
    pub fn delete_message(&self, id: &str) -> MailboxResult<bool> {
        self.with_state(|s| s.messages.remove(id).is_some())
    }

    pub fn message_exists(&self, id: &str) -> MailboxResult<bool> {
        self.with_state(|s| s.messages.contains_key(id))
    }

    pub fn get_or_create_mailbox(&self, agent: &str) -> MailboxResult<Mailbox> {
        let capacity = self.capacity;
        self.with_state(|s| {
            s.mailboxes
                .entry(agent.to_string())
                .or_insert_with(|| {
                    tracing::debug!(agent, capacity, "created mailbox");
                    Mailbox::new(capacity)
                })
                .clone()
        })
    }

    /// Number of registered, unacknowledged messages.
    pub fn pending_count(&self) -> MailboxResult<usize> {
        self.with_state(|s| s.messages.len())
    }

    pub fn mailbox_count(&self) -> MailboxResult<usize> {
        self.with_state(|s| s.mailboxes.len())
    }

    pub fn backlog(&self) -> MailboxResult<Backlog> {
        self.with_state(|s| {
            s.mailboxes
                .values()
                .filter(|m| !m.is_empty())
                .fold(Backlog::default(), |acc, m| Backlog {
                    queued: acc.queued + m.len(),
                    agents: acc.agents + 1,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, to: &str) -> Message {
        Message {
            id: id.to_string(),
            from: "a".to_string(),
            to: to.to_string(),
            content: "hi".to_string(),
            timestamp: 0,
        }
    }

    #[test]
    fn mailbox_is_created_once_per_name() {
        let registry = Registry::new(4, CancellationToken::new());
        let first = registry.get_or_create_mailbox("b").unwrap();
        let again = registry.get_or_create_mailbox("b").unwrap();
        let other = registry.get_or_create_mailbox("c").unwrap();

        assert!(first.same_queue(&again));
        assert!(!first.same_queue(&other));
        assert_eq!(first.capacity(), 4);
        assert_eq!(registry.mailbox_count().unwrap(), 2);
    }

    #[test]
    fn register_and_delete() {
        let registry = Registry::new(4, CancellationToken::new());
        registry.register_message(msg("m1", "b")).unwrap();

        assert!(registry.message_exists("m1").unwrap());
        assert_eq!(registry.pending_count().unwrap(), 1);
        assert!(registry.delete_message("m1").unwrap());
        assert!(!registry.message_exists("m1").unwrap());
        assert!(!registry.delete_message("m1").unwrap());
    }

    #[test]
    fn mailbox_rejects_when_full() {
        let registry = Registry::new(2, CancellationToken::new());
        let mailbox = registry.get_or_create_mailbox("b").unwrap();

        mailbox.try_push(msg("m1", "b")).unwrap();
        mailbox.try_push(msg("m2", "b")).unwrap();
        let rejected = mailbox.try_push(msg("m3", "b")).unwrap_err();
        assert_eq!(rejected.id, "m3");
        assert_eq!(mailbox.len(), 2);

        assert_eq!(mailbox.try_recv().unwrap().id, "m1");
        assert_eq!(mailbox.try_recv().unwrap().id, "m2");
        assert!(mailbox.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let registry = Registry::new(0, CancellationToken::new());
        assert_eq!(registry.capacity(), 1);
        let mailbox = registry.get_or_create_mailbox("b").unwrap();
        assert_eq!(mailbox.capacity(), 1);
    }

    #[test]
    fn backlog_counts_undelivered_messages() {
        let registry = Registry::new(4, CancellationToken::new());
        let b = registry.get_or_create_mailbox("b").unwrap();
        let c = registry.get_or_create_mailbox("c").unwrap();
        registry.get_or_create_mailbox("idle").unwrap();

        b.try_push(msg("m1", "b")).unwrap();
        b.try_push(msg("m2", "b")).unwrap();
        c.try_push(msg("m3", "c")).unwrap();
        assert_eq!(registry.backlog().unwrap(), Backlog { queued: 3, agents: 2 });

        b.try_recv().unwrap();
        b.try_recv().unwrap();
        assert_eq!(registry.backlog().unwrap(), Backlog { queued: 1, agents: 1 });
    }

    #[tokio::test]
    async fn handles_share_one_queue() {
        let registry = Registry::new(4, CancellationToken::new());
        let producer = registry.get_or_create_mailbox("b").unwrap();
        let consumer = registry.get_or_create_mailbox("b").unwrap();

        producer.try_push(msg("m1", "b")).unwrap();
        assert_eq!(consumer.recv().await.unwrap().id, "m1");
        assert!(producer.is_empty());
    }
}
