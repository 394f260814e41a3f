/// One channel in a join request. A `None` key means a public join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub name: String,
    pub key: Option<String>,
}

impl JoinRequest {
    pub fn new(name: impl Into<String>, key: Option<String>) -> Self {
        Self {
            name: name.into(),
            key: key.filter(|k| !k.is_empty()),
        }
    }
}

/// Outbound membership requests, implemented by the protocol engine.
///
/// Both calls are fire-and-forget: they queue a command for the server and
/// return immediately. The collection only changes once the server confirms.
pub trait MembershipRequests: Send + Sync {
    fn request_join(&self, channels: &[JoinRequest]);

    fn request_leave(&self, channels: &[String], comment: Option<&str>);
}
