//! Helpers to build client command lines. All functions return formatted
//! strings ready to send (caller appends \r\n).

use crate::engine::requests::JoinRequest;

use super::parser::IrcMessage;

/// PASS password
pub fn pass(password: &str) -> String {
    IrcMessage::command("PASS", vec![password.into()]).format()
}

/// NICK nickname
pub fn nick(nickname: &str) -> String {
    IrcMessage::command("NICK", vec![nickname.into()]).format()
}

/// USER username 0 * :realname
pub fn user(username: &str, realname: &str) -> String {
    IrcMessage::command(
        "USER",
        vec![username.into(), "0".into(), "*".into(), realname.into()],
    )
    .format()
}

/// JOIN #a,#b[,#c] [key_a,key_b]
///
/// Keys pair with channels by position, so keyed channels go first.
/// Returns `None` for an empty request.
pub fn join(channels: &[JoinRequest]) -> Option<String> {
    if channels.is_empty() {
        return None;
    }

    let (keyed, open): (Vec<&JoinRequest>, Vec<&JoinRequest>) =
        channels.iter().partition(|c| c.key.is_some());

    let names: Vec<&str> = keyed
        .iter()
        .chain(open.iter())
        .map(|c| c.name.as_str())
        .collect();
    let keys: Vec<&str> = keyed.iter().filter_map(|c| c.key.as_deref()).collect();

    let mut params = vec![names.join(",")];
    if !keys.is_empty() {
        params.push(keys.join(","));
    }
    Some(IrcMessage::command("JOIN", params).format())
}

/// PART #a,#b [:comment]
pub fn part(channels: &[String], comment: Option<&str>) -> Option<String> {
    if channels.is_empty() {
        return None;
    }

    let mut params = vec![channels.join(",")];
    if let Some(c) = comment {
        params.push(c.to_string());
    }
    Some(IrcMessage::command("PART", params).format())
}

/// PONG :token
pub fn pong(token: &str) -> String {
    IrcMessage::command("PONG", vec![token.into()]).format()
}

/// QUIT [:reason]
pub fn quit(reason: Option<&str>) -> String {
    let params = reason.map(|r| vec![r.to_string()]).unwrap_or_default();
    IrcMessage::command("QUIT", params).format()
}
