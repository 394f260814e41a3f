use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::collection::ChannelCollection;
use super::events::ClientEvent;
use super::requests::MembershipRequests;

/// Unique identifier for a client instance (one per connection).
pub type ClientId = Uuid;

/// Buffered client events per subscriber before lagging receivers drop old ones.
pub const EVENT_CAPACITY: usize = 256;

/// State shared by every `IrcClient` handle for one connection.
#[derive(Debug)]
pub(crate) struct ClientShared {
    id: ClientId,
    nickname: RwLock<String>,
    channels: ChannelCollection,
    events: broadcast::Sender<ClientEvent>,
}

/// Handle to a connected IRC client. Clones share the same state.
#[derive(Debug, Clone)]
pub struct IrcClient {
    shared: Arc<ClientShared>,
}

impl IrcClient {
    /// Create a client with an empty channel collection. Join and part
    /// requests made through the collection are forwarded to `requests`.
    pub fn new(nickname: impl Into<String>, requests: Arc<dyn MembershipRequests>) -> Self {
        let nickname = nickname.into();
        let shared = Arc::new_cyclic(|owner| ClientShared {
            id: Uuid::new_v4(),
            nickname: RwLock::new(nickname),
            channels: ChannelCollection::new(owner.clone(), requests),
            events: broadcast::channel(EVENT_CAPACITY).0,
        });
        Self { shared }
    }

    pub(crate) fn from_shared(shared: Arc<ClientShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared_ptr(&self) -> *const ClientShared {
        Arc::as_ptr(&self.shared)
    }

    pub fn id(&self) -> ClientId {
        self.shared.id
    }

    pub fn nickname(&self) -> String {
        self.shared
            .nickname
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_own_nick(&self, nick: &str) -> bool {
        self.shared
            .nickname
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .eq_ignore_ascii_case(nick)
    }

    /// Channels this client is currently on.
    pub fn channels(&self) -> &ChannelCollection {
        &self.shared.channels
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    pub(crate) fn set_nickname(&self, nickname: &str) {
        *self
            .shared
            .nickname
            .write()
            .unwrap_or_else(PoisonError::into_inner) = nickname.to_string();
    }

    /// Publish an event. Having no subscribers is not an error.
    pub(crate) fn emit(&self, event: ClientEvent) {
        let _ = self.shared.events.send(event);
    }
}

impl PartialEq for IrcClient {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for IrcClient {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::requests::testing::RecordingRequests;

    #[test]
    fn test_new_client_has_empty_collection() {
        let client = IrcClient::new("alice", Arc::new(RecordingRequests::default()));
        assert_eq!(client.nickname(), "alice");
        assert!(client.channels().is_empty());
        assert_eq!(client.channels().client().as_ref(), Some(&client));
    }

    #[test]
    fn test_clones_are_the_same_client() {
        let client = IrcClient::new("alice", Arc::new(RecordingRequests::default()));
        let other = IrcClient::new("alice", Arc::new(RecordingRequests::default()));
        assert_eq!(client, client.clone());
        assert_ne!(client, other);
        assert_ne!(client.id(), other.id());
    }

    #[test]
    fn test_own_nick_is_case_insensitive() {
        let client = IrcClient::new("Alice", Arc::new(RecordingRequests::default()));
        assert!(client.is_own_nick("alice"));
        client.set_nickname("bob");
        assert!(!client.is_own_nick("alice"));
        assert!(client.is_own_nick("BOB"));
    }
}
