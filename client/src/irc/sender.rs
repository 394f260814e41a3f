use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::requests::{JoinRequest, MembershipRequests};

use super::formatter;

/// Forwards membership requests to a connection's outbound line queue.
#[derive(Debug, Clone)]
pub struct CommandSender {
    out_tx: mpsc::UnboundedSender<String>,
}

impl CommandSender {
    pub fn new(out_tx: mpsc::UnboundedSender<String>) -> Self {
        Self { out_tx }
    }

    /// Queue a raw line. Dropped with a warning once the connection is gone.
    pub fn send_line(&self, line: String) {
        if self.out_tx.send(line).is_err() {
            warn!("connection closed, dropping outbound line");
        }
    }
}

impl MembershipRequests for CommandSender {
    fn request_join(&self, channels: &[JoinRequest]) {
        if let Some(line) = formatter::join(channels) {
            self.send_line(line);
        }
    }

    fn request_leave(&self, channels: &[String], comment: Option<&str>) {
        if let Some(line) = formatter::part(channels, comment) {
            self.send_line(line);
        }
    }
}
