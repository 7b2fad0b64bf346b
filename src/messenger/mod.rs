//! In-process publish/subscribe notifier.
//!
//! Modeled directly on the upstream `Messenger`/`Subscriber`/`Inbox`
//! classes: clients register interest in a subject type and a set of event
//! types, receive a subscriber id, and poll their inbox for matching
//! messages until it expires from inactivity.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{Error, MessengerError, Result};
use crate::types::{MessageEventType, SubjectType};

/// Maximum number of buffered messages per inbox before it is torn down.
pub const MESSAGE_LIMIT: usize = 1000;
/// An inbox that hasn't been polled in this long is considered abandoned.
pub const EXPIRATION: Duration = Duration::from_secs(300);

/// A single notification fanned out to interested subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub subject_type: SubjectType,
    pub event_type: MessageEventType,
    pub subject_id: i64,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// What a subscriber wants to hear about: a subject type plus a set of
/// event types (defaults to all three).
#[derive(Debug, Clone)]
pub struct Interest {
    pub subject_type: SubjectType,
    pub event_types: HashSet<MessageEventType>,
}

impl Interest {
    pub fn all_events(subject_type: SubjectType) -> Self {
        Self {
            subject_type,
            event_types: MessageEventType::all(),
        }
    }

    fn matches(&self, message: &Message) -> bool {
        self.subject_type == message.subject_type && self.event_types.contains(&message.event_type)
    }
}

struct Inbox {
    messages: VecDeque<Message>,
    last_checked: Instant,
}

impl Inbox {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            last_checked: Instant::now(),
        }
    }

    fn expired(&self) -> bool {
        self.last_checked.elapsed() > EXPIRATION
    }

    fn put(&mut self, message: Message) -> Result<()> {
        if self.messages.len() >= MESSAGE_LIMIT {
            return Err(Error::Other("inbox is full".into()));
        }
        self.messages.push_back(message);
        Ok(())
    }

    fn pop_all(&mut self) -> Vec<Message> {
        self.last_checked = Instant::now();
        self.messages.drain(..).collect()
    }
}

struct Subscriber {
    interests: Mutex<Vec<Interest>>,
    inbox: Mutex<Inbox>,
}

impl Subscriber {
    fn new() -> Self {
        Self {
            interests: Mutex::new(Vec::new()),
            inbox: Mutex::new(Inbox::new()),
        }
    }

    fn interested(&self, message: &Message) -> bool {
        let interests = self.interests.lock().unwrap_or_else(|e| e.into_inner());
        interests.iter().any(|i| i.matches(message))
    }
}

/// The pub/sub hub. Subscribers register interest, publishers call
/// [`Messenger::publish`], and each subscriber polls its own inbox.
pub struct Messenger {
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}

impl Messenger {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new subscriber with no interests yet and returns its id.
    pub fn new_subscriber(&self) -> Uuid {
        let id = Uuid::new_v4();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.insert(id, Subscriber::new());
        id
    }

    /// Replaces a subscriber's interest list wholesale.
    pub fn set_interests(&self, id: Uuid, interests: Vec<Interest>) -> Result<()> {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let subscriber = subscribers
            .get(&id)
            .ok_or_else(|| Error::Messenger(MessengerError::SubscriberNotFound(id.to_string())))?;
        *subscriber.interests.lock().unwrap_or_else(|e| e.into_inner()) = interests;
        Ok(())
    }

    /// Drains and returns every message currently buffered for `id`,
    /// resetting its expiration clock.
    pub fn get_messages(&self, id: Uuid) -> Result<Vec<Message>> {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let subscriber = subscribers
            .get(&id)
            .ok_or_else(|| Error::Messenger(MessengerError::SubscriberNotFound(id.to_string())))?;
        Ok(subscriber.inbox.lock().unwrap_or_else(|e| e.into_inner()).pop_all())
    }

    /// Removes a subscriber and its inbox.
    pub fn remove_subscriber(&self, id: Uuid) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.remove(&id);
    }

    /// Fans `message` out to every interested, non-expired subscriber.
    /// Expired subscribers are torn down as a side effect; a subscriber
    /// whose inbox is full is torn down rather than blocked on.
    pub fn publish(&self, message: Message) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|_, subscriber| {
            !subscriber.inbox.lock().unwrap_or_else(|e| e.into_inner()).expired()
        });

        let mut full = Vec::new();
        for (id, subscriber) in subscribers.iter() {
            if !subscriber.interested(&message) {
                continue;
            }
            let mut inbox = subscriber.inbox.lock().unwrap_or_else(|e| e.into_inner());
            if inbox.put(message.clone()).is_err() {
                full.push(*id);
            }
        }
        for id in full {
            subscribers.remove(&id);
        }
    }
}
