use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Top-level client configuration, loaded from concord-client.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerSection,
    pub identity: IdentitySection,
    pub channels: ChannelsSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// `host:port` of the IRC server.
    pub address: String,
    pub tls: bool,
    /// Extra CA certificate (PEM) to trust alongside the bundled web roots.
    pub ca_file: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6667".into(),
            tls: false,
            ca_file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub nickname: String,
    pub username: String,
    pub realname: String,
    /// Sent as PASS before registration when set.
    pub password: Option<String>,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            nickname: "concord".into(),
            username: "concord".into(),
            realname: "Concord IRC client".into(),
            password: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ChannelsSection {
    /// Channels to join once registered.
    pub autojoin: Vec<AutoJoin>,
    /// Comment sent with PART when none is given.
    pub part_message: Option<String>,
}

/// An autojoin entry: either `"#channel"` or `{ name = "#channel", key = "..." }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AutoJoin {
    Name(String),
    Keyed { name: String, key: Option<String> },
}

impl AutoJoin {
    pub fn name(&self) -> &str {
        match self {
            AutoJoin::Name(name) | AutoJoin::Keyed { name, .. } => name,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            AutoJoin::Name(_) => None,
            AutoJoin::Keyed { key, .. } => key.as_deref(),
        }
    }
}

impl ClientConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            Self::from_toml(&contents)
                .with_context(|| format!("failed to parse config file {path}"))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("IRC_SERVER") {
            self.server.address = v;
        }
        if let Ok(v) = std::env::var("IRC_TLS")
            && let Ok(tls) = v.parse()
        {
            self.server.tls = tls;
        }
        if let Ok(v) = std::env::var("IRC_CA_FILE") {
            self.server.ca_file = Some(v);
        }
        if let Ok(v) = std::env::var("IRC_NICK") {
            self.identity.nickname = v;
        }
        if let Ok(v) = std::env::var("IRC_USERNAME") {
            self.identity.username = v;
        }
        if let Ok(v) = std::env::var("IRC_REALNAME") {
            self.identity.realname = v;
        }
        if let Ok(v) = std::env::var("IRC_PASSWORD") {
            self.identity.password = Some(v);
        }
        if let Ok(v) = std::env::var("IRC_AUTOJOIN") {
            self.channels.autojoin = parse_channel_list(&v);
        }
        if let Ok(v) = std::env::var("IRC_PART_MESSAGE") {
            self.channels.part_message = Some(v);
        }
    }
}

/// Parse `#a,#b:key` style lists (a key follows the first `:`).
pub fn parse_channel_list(list: &str) -> Vec<AutoJoin> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((name, key)) => AutoJoin::Keyed {
                name: name.to_string(),
                key: Some(key.to_string()),
            },
            None => AutoJoin::Name(entry.to_string()),
        })
        .collect()
}
