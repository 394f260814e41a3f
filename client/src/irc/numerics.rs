//! Server numerics the client reacts to (RFC 2812 section 5).

pub const RPL_WELCOME: &str = "001";

pub const ERR_NOSUCHCHANNEL: &str = "403";
pub const ERR_TOOMANYCHANNELS: &str = "405";
pub const ERR_NICKNAMEINUSE: &str = "433";
pub const ERR_NOTONCHANNEL: &str = "442";
pub const ERR_CHANNELISFULL: &str = "471";
pub const ERR_INVITEONLYCHAN: &str = "473";
pub const ERR_BANNEDFROMCHAN: &str = "474";
pub const ERR_BADCHANNELKEY: &str = "475";
pub const ERR_BADCHANMASK: &str = "476";

/// Replies that mean a JOIN was refused.
pub const JOIN_FAILURES: &[&str] = &[
    ERR_NOSUCHCHANNEL,
    ERR_TOOMANYCHANNELS,
    ERR_CHANNELISFULL,
    ERR_INVITEONLYCHAN,
    ERR_BANNEDFROMCHAN,
    ERR_BADCHANNELKEY,
    ERR_BADCHANMASK,
];
