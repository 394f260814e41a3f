pub mod channel;
pub mod client;
pub mod collection;
pub mod events;
pub mod requests;

pub use channel::Channel;
pub use client::{ClientId, IrcClient};
pub use collection::{ChangeSummary, ChannelCollection, ChannelsChanged};
pub use events::ClientEvent;
pub use requests::{JoinRequest, MembershipRequests};
