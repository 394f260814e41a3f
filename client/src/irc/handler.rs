use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::channel::Channel;
use crate::engine::client::IrcClient;
use crate::engine::events::ClientEvent;

use super::formatter;
use super::numerics::*;
use super::parser::IrcMessage;

/// Dispatch one server message for `client`. Returns lines to send back.
///
/// Runs on the connection's read loop, which is the only place the channel
/// collection is mutated.
pub fn handle_server_message(client: &IrcClient, msg: &IrcMessage) -> Vec<String> {
    match msg.command.as_str() {
        "PING" => {
            let token = msg.param(0).unwrap_or_default();
            return vec![formatter::pong(token)];
        }
        "JOIN" => handle_join(client, msg),
        "PART" => handle_part(client, msg),
        "KICK" => handle_kick(client, msg),
        "NICK" => handle_nick(client, msg),
        RPL_WELCOME => handle_welcome(client, msg),
        ERR_NOTONCHANNEL => {
            if let Some((channel, reason)) = numeric_target(msg) {
                client.emit(ClientEvent::LeaveFailed {
                    channel,
                    code: msg.command.clone(),
                    reason,
                });
            }
        }
        code if JOIN_FAILURES.contains(&code) => {
            if let Some((channel, reason)) = numeric_target(msg) {
                warn!(%channel, %code, %reason, "join refused");
                client.emit(ClientEvent::JoinFailed {
                    channel,
                    code: msg.command.clone(),
                    reason,
                });
            }
        }
        ERR_NICKNAMEINUSE => {
            warn!(nick = msg.param(1).unwrap_or_default(), "nickname in use");
        }
        _ => {}
    }
    Vec::new()
}

fn is_from_self(client: &IrcClient, msg: &IrcMessage) -> bool {
    msg.source_nick().is_some_and(|nick| client.is_own_nick(nick))
}

/// Comma-separated channel list in the first parameter.
fn channel_list(msg: &IrcMessage) -> Vec<&str> {
    msg.param(0)
        .map(|p| p.split(',').filter(|c| !c.is_empty()).collect())
        .unwrap_or_default()
}

/// `<nick> <channel> :<reason>` as used by the channel error numerics.
fn numeric_target(msg: &IrcMessage) -> Option<(String, String)> {
    let channel = msg.param(1)?.to_string();
    let reason = if msg.params.len() > 2 {
        msg.params.last().cloned().unwrap_or_default()
    } else {
        String::new()
    };
    Some((channel, reason))
}

fn handle_join(client: &IrcClient, msg: &IrcMessage) {
    if !is_from_self(client, msg) {
        return;
    }

    let added: Vec<Arc<Channel>> = channel_list(msg).into_iter().map(Channel::new).collect();
    if added.is_empty() {
        debug!("JOIN without a channel");
        return;
    }
    client.channels().apply_change(added, Vec::new());
}

fn handle_part(client: &IrcClient, msg: &IrcMessage) {
    if !is_from_self(client, msg) {
        return;
    }

    let removed: Vec<Arc<Channel>> = channel_list(msg)
        .into_iter()
        .filter_map(|name| client.channels().get(name))
        .collect();
    client.channels().apply_change(Vec::new(), removed);
}

fn handle_kick(client: &IrcClient, msg: &IrcMessage) {
    let (Some(channel), Some(target)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    if !client.is_own_nick(target) {
        return;
    }

    let by = msg.source_nick().unwrap_or_default().to_string();
    let reason = msg.param(2).map(str::to_string);
    info!(%channel, %by, "kicked from channel");

    if let Some(entity) = client.channels().get(channel) {
        client.channels().apply_change(Vec::new(), vec![entity]);
    }
    client.emit(ClientEvent::Kicked {
        channel: channel.to_string(),
        by,
        reason,
    });
}

fn handle_nick(client: &IrcClient, msg: &IrcMessage) {
    let Some(new_nick) = msg.param(0) else {
        return;
    };
    if !is_from_self(client, msg) {
        return;
    }

    let old_nick = client.nickname();
    client.set_nickname(new_nick);
    client.emit(ClientEvent::NickChanged {
        old_nick,
        new_nick: new_nick.to_string(),
    });
}

fn handle_welcome(client: &IrcClient, msg: &IrcMessage) {
    // The server may have truncated or altered the nick we asked for.
    if let Some(nick) = msg.param(0) {
        client.set_nickname(nick);
    }
    let nickname = client.nickname();
    info!(%nickname, "registered");
    client.emit(ClientEvent::Registered { nickname });
}
