use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, Weak};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::channel::Channel;
use super::client::{ClientShared, IrcClient};
use super::requests::{JoinRequest, MembershipRequests};

/// Buffered change notifications per subscriber.
pub const CHANGE_CAPACITY: usize = 256;

/// One structural change to a channel collection. By the time a subscriber
/// receives it, every back-reference already reflects the new membership.
#[derive(Debug, Clone, Default)]
pub struct ChannelsChanged {
    pub added: Vec<Arc<Channel>>,
    pub removed: Vec<Arc<Channel>>,
}

/// Channel names from a `ChannelsChanged`, for display and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ChannelsChanged {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            added: self.added.iter().map(|c| c.name().to_string()).collect(),
            removed: self.removed.iter().map(|c| c.name().to_string()).collect(),
        }
    }
}

/// The channels a client is currently on, in join order.
///
/// Read-only outside this crate. Membership only changes when the protocol
/// engine applies a server-confirmed join or part; the `request_*` methods
/// just ask the server.
pub struct ChannelCollection {
    owner: Weak<ClientShared>,
    channels: RwLock<Vec<Arc<Channel>>>,
    changes: broadcast::Sender<ChannelsChanged>,
    requests: Arc<dyn MembershipRequests>,
}

impl fmt::Debug for ChannelCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCollection")
            .field("channels", &self.names())
            .finish()
    }
}

impl ChannelCollection {
    pub(crate) fn new(owner: Weak<ClientShared>, requests: Arc<dyn MembershipRequests>) -> Self {
        Self {
            owner,
            channels: RwLock::new(Vec::new()),
            changes: broadcast::channel(CHANGE_CAPACITY).0,
            requests,
        }
    }

    // ── Requests ────────────────────────────────────────────────────

    /// Ask the server to join each channel, without keys.
    pub fn request_join<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_join_with_keys(names.into_iter().map(|name| (name, None::<String>)));
    }

    /// Ask the server to join each channel, supplying a key where given.
    /// An empty key is the same as no key.
    pub fn request_join_with_keys<I, N, K>(&self, channels: I)
    where
        I: IntoIterator<Item = (N, Option<K>)>,
        N: Into<String>,
        K: Into<String>,
    {
        let requests: Vec<JoinRequest> = channels
            .into_iter()
            .map(|(name, key)| JoinRequest::new(name, key.map(Into::into)))
            .collect();
        if requests.is_empty() {
            return;
        }

        debug!(count = requests.len(), "forwarding join request");
        self.requests.request_join(&requests);
    }

    /// Ask the server to part each channel. An empty comment is the same as none.
    pub fn request_leave<I, S>(&self, names: I, comment: Option<&str>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return;
        }

        debug!(count = names.len(), "forwarding part request");
        self.requests
            .request_leave(&names, comment.filter(|c| !c.is_empty()));
    }

    // ── Read surface ────────────────────────────────────────────────

    /// The client this collection belongs to.
    pub fn client(&self) -> Option<IrcClient> {
        self.owner.upgrade().map(IrcClient::from_shared)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, channel: &Arc<Channel>) -> bool {
        self.read().iter().any(|c| Arc::ptr_eq(c, channel))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.read().iter().find(|c| c.name_matches(name)).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.read().iter().map(|c| c.name().to_string()).collect()
    }

    /// Current channels in join order.
    pub fn snapshot(&self) -> Vec<Arc<Channel>> {
        self.read().clone()
    }

    /// Run `f` against the current channels while holding the read lock.
    /// No change can land until `f` returns, so membership and back-references
    /// are seen together.
    ///
    /// `f` must not call back into this collection (`len`, `names`, ...): the
    /// std lock may block a nested read behind a waiting writer and deadlock.
    /// Reading the channels it is given is fine.
    pub fn with_channels<R>(&self, f: impl FnOnce(&[Arc<Channel>]) -> R) -> R {
        f(&self.read())
    }

    /// Subscribe to structural changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelsChanged> {
        self.changes.subscribe()
    }

    // ── Mutation (protocol engine only) ─────────────────────────────

    /// Apply a server-confirmed change. This is the only mutation path.
    ///
    /// Membership and back-references are updated under the write lock, and
    /// the notification goes out only after it is released. Returns the change
    /// that was published, or `None` if nothing actually changed.
    pub(crate) fn apply_change(
        &self,
        added: Vec<Arc<Channel>>,
        removed: Vec<Arc<Channel>>,
    ) -> Option<ChannelsChanged> {
        let change = {
            let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
            let mut change = ChannelsChanged::default();

            for channel in removed {
                if let Some(pos) = channels.iter().position(|c| Arc::ptr_eq(c, &channel)) {
                    change.removed.push(channels.remove(pos));
                }
            }

            for channel in added {
                if channels.iter().any(|c| c.name_matches(channel.name())) {
                    debug!(channel = %channel.name(), "already joined, ignoring");
                    continue;
                }
                if channel.is_joined() && !channel.is_owned_by(&self.owner) {
                    warn!(channel = %channel.name(), "channel belongs to another client, ignoring");
                    continue;
                }
                channels.push(channel.clone());
                change.added.push(channel);
            }

            for channel in &change.removed {
                channel.clear_client();
            }
            for channel in &change.added {
                channel.set_client(self.owner.clone());
            }

            change
        };

        if change.is_empty() {
            return None;
        }

        let summary = change.summary();
        info!(added = ?summary.added, removed = ?summary.removed, "channel membership changed");
        let _ = self.changes.send(change.clone());
        Some(change)
    }

    /// Remove every channel, e.g. when the connection drops.
    pub(crate) fn clear(&self) -> Option<ChannelsChanged> {
        let all = self.snapshot();
        self.apply_change(Vec::new(), all)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Channel>>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;
    use crate::engine::requests::testing::RecordingRequests;

    fn setup() -> (IrcClient, Arc<RecordingRequests>) {
        let requests = Arc::new(RecordingRequests::default());
        let client = IrcClient::new("alice", requests.clone());
        (client, requests)
    }

    fn join(client: &IrcClient, names: &[&str]) -> Vec<Arc<Channel>> {
        let added: Vec<_> = names.iter().map(|n| Channel::new(*n)).collect();
        client.channels().apply_change(added.clone(), Vec::new());
        added
    }

    /// Every channel in the collection points back at the client, and the
    /// given outside channels do not.
    fn assert_consistent(client: &IrcClient, outside: &[Arc<Channel>]) {
        client.channels().with_channels(|channels| {
            for c in channels {
                assert!(c.belongs_to(client), "{} should belong to client", c.name());
            }
            for c in outside {
                if !channels.iter().any(|m| Arc::ptr_eq(m, c)) {
                    assert!(!c.is_joined(), "{} should have no client", c.name());
                }
            }
        });
    }

    #[test]
    fn test_join_sets_back_reference() {
        let (client, _) = setup();
        let added = join(&client, &["#test"]);

        assert_eq!(client.channels().names(), vec!["#test"]);
        assert_eq!(added[0].client().as_ref(), Some(&client));
        assert!(client.channels().contains(&added[0]));
    }

    #[test]
    fn test_part_clears_cached_reference() {
        let (client, _) = setup();
        join(&client, &["#test"]);
        let cached = client.channels().get("#test").unwrap();

        let change = client
            .channels()
            .apply_change(Vec::new(), vec![cached.clone()])
            .unwrap();

        assert_eq!(change.summary().removed, vec!["#test"]);
        assert!(cached.client().is_none());
        assert!(!client.channels().contains(&cached));
        assert!(client.channels().is_empty());
    }

    #[test]
    fn test_order_is_join_order() {
        let (client, _) = setup();
        join(&client, &["#a", "#b"]);
        join(&client, &["#c"]);
        assert_eq!(client.channels().names(), vec!["#a", "#b", "#c"]);

        let b = client.channels().get("#b").unwrap();
        client.channels().apply_change(Vec::new(), vec![b.clone()]);
        assert_eq!(client.channels().names(), vec!["#a", "#c"]);
        assert_consistent(&client, &[b]);
    }

    #[test]
    fn test_duplicate_join_is_ignored() {
        let (client, _) = setup();
        let first = join(&client, &["#rust"]);
        let mut rx = client.channels().subscribe();

        let dup = Channel::new("#RUST");
        let change = client.channels().apply_change(vec![dup.clone()], Vec::new());

        assert!(change.is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(client.channels().len(), 1);
        assert!(first[0].belongs_to(&client));
        assert!(!dup.is_joined());
    }

    #[test]
    fn test_duplicate_within_one_batch_keeps_first() {
        let (client, _) = setup();
        let added = join(&client, &["#a", "#a", "#b"]);
        assert_eq!(client.channels().names(), vec!["#a", "#b"]);
        assert!(added[0].belongs_to(&client));
        assert!(!added[1].is_joined());
        assert_consistent(&client, &added);
    }

    #[test]
    fn test_removing_absent_channel_is_ignored() {
        let (client, _) = setup();
        join(&client, &["#a"]);
        let stranger = Channel::new("#a");
        assert!(
            client
                .channels()
                .apply_change(Vec::new(), vec![stranger])
                .is_none()
        );
        assert_eq!(client.channels().names(), vec!["#a"]);
    }

    #[test]
    fn test_rejoin_in_same_batch() {
        let (client, _) = setup();
        let old = join(&client, &["#a"]).remove(0);
        let new = Channel::new("#a");

        let change = client
            .channels()
            .apply_change(vec![new.clone()], vec![old.clone()])
            .unwrap();

        assert_eq!(change.added.len(), 1);
        assert_eq!(change.removed.len(), 1);
        assert!(!old.is_joined());
        assert!(new.belongs_to(&client));
    }

    #[test]
    fn test_channel_of_other_client_is_refused() {
        let (client, _) = setup();
        let (other, _) = setup();
        let theirs = join(&other, &["#a"]).remove(0);

        assert!(
            client
                .channels()
                .apply_change(vec![theirs.clone()], Vec::new())
                .is_none()
        );
        assert!(theirs.belongs_to(&other));
        assert!(client.channels().is_empty());
    }

    #[test]
    fn test_clear_removes_everything() {
        let (client, _) = setup();
        let added = join(&client, &["#a", "#b"]);
        let change = client.channels().clear().unwrap();
        assert_eq!(change.summary().removed, vec!["#a", "#b"]);
        assert!(client.channels().is_empty());
        assert!(added.iter().all(|c| !c.is_joined()));
        assert!(client.channels().clear().is_none());
    }

    #[test]
    fn test_notification_sees_updated_back_references() {
        let (client, _) = setup();
        let mut rx = client.channels().subscribe();
        let added = join(&client, &["#a", "#b"]);

        let change = rx.try_recv().unwrap();
        assert_eq!(change.summary().added, vec!["#a", "#b"]);
        assert!(change.added.iter().all(|c| c.belongs_to(&client)));

        client
            .channels()
            .apply_change(Vec::new(), vec![added[0].clone()]);
        let change = rx.try_recv().unwrap();
        assert!(change.removed.iter().all(|c| !c.is_joined()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_names_stay_unique() {
        let (client, _) = setup();
        for round in 0..5 {
            join(&client, &["#a", "#b", "#c"]);
            if round % 2 == 0 {
                let b = client.channels().get("#b").unwrap();
                client.channels().apply_change(Vec::new(), vec![b]);
            }
        }
        let names = client.channels().names();
        let unique: HashSet<_> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_readers_never_see_torn_state() {
        let (client, _) = setup();
        let writer_client = client.clone();

        let writer = thread::spawn(move || {
            for i in 0..500 {
                let name = format!("#c{}", i % 7);
                match writer_client.channels().get(&name) {
                    Some(c) => writer_client.channels().apply_change(Vec::new(), vec![c]),
                    None => writer_client
                        .channels()
                        .apply_change(vec![Channel::new(name)], Vec::new()),
                };
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let client = client.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        client.channels().with_channels(|channels| {
                            assert!(channels.iter().all(|c| c.belongs_to(&client)));
                        });
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_request_join_forwards_without_mutating() {
        let (client, requests) = setup();
        client
            .channels()
            .request_join_with_keys([("#a", Some("secret")), ("#b", None)]);

        let joins = requests.joins.lock().unwrap();
        assert_eq!(
            *joins,
            vec![vec![
                JoinRequest::new("#a", Some("secret".into())),
                JoinRequest::new("#b", None),
            ]]
        );
        assert!(client.channels().is_empty());
    }

    #[test]
    fn test_request_join_passes_duplicates_through() {
        let (client, requests) = setup();
        client.channels().request_join(["#a", "#a"]);
        let joins = requests.joins.lock().unwrap();
        assert_eq!(joins[0].len(), 2);
        assert!(joins[0].iter().all(|r| r.key.is_none()));
    }

    #[test]
    fn test_empty_requests_are_noops() {
        let (client, requests) = setup();
        client.channels().request_join(Vec::<String>::new());
        client
            .channels()
            .request_join_with_keys(Vec::<(String, Option<String>)>::new());
        client.channels().request_leave(Vec::<String>::new(), None);

        assert!(requests.joins.lock().unwrap().is_empty());
        assert!(requests.leaves.lock().unwrap().is_empty());
        assert!(client.channels().is_empty());
    }

    #[test]
    fn test_request_leave_forwards_comment() {
        let (client, requests) = setup();
        join(&client, &["#a"]);
        client.channels().request_leave(["#a"], Some("bye"));
        client.channels().request_leave(["#a"], Some(""));

        let leaves = requests.leaves.lock().unwrap();
        assert_eq!(leaves[0], (vec!["#a".to_string()], Some("bye".to_string())));
        assert_eq!(leaves[1], (vec!["#a".to_string()], None));
        assert_eq!(client.channels().names(), vec!["#a"]);
    }
}
