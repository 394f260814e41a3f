use std::sync::{Arc, PoisonError, RwLock, Weak};

use chrono::{DateTime, Utc};

use super::client::{ClientShared, IrcClient};

/// A channel the client has joined.
///
/// Handles stay valid after the client leaves; a stale handle simply reports
/// no owning client.
#[derive(Debug)]
pub struct Channel {
    name: String,
    joined_at: DateTime<Utc>,
    /// Client whose collection currently holds this channel. Non-owning.
    client: RwLock<Weak<ClientShared>>,
}

impl Channel {
    /// Created by the protocol engine once the server confirms a join.
    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            joined_at: Utc::now(),
            client: RwLock::new(Weak::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    /// The client currently tracking this channel as joined, if any.
    pub fn client(&self) -> Option<IrcClient> {
        self.back_ref().upgrade().map(IrcClient::from_shared)
    }

    pub fn is_joined(&self) -> bool {
        self.back_ref().strong_count() > 0
    }

    pub fn belongs_to(&self, client: &IrcClient) -> bool {
        std::ptr::eq(self.back_ref().as_ptr(), client.shared_ptr())
    }

    /// IRC channel names are case-insensitive.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub(crate) fn is_owned_by(&self, owner: &Weak<ClientShared>) -> bool {
        self.is_joined() && Weak::ptr_eq(&self.back_ref(), owner)
    }

    pub(crate) fn set_client(&self, owner: Weak<ClientShared>) {
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = owner;
    }

    pub(crate) fn clear_client(&self) {
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = Weak::new();
    }

    fn back_ref(&self) -> Weak<ClientShared> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
