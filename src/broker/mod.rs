//! The `broker` module holds the in-process event distribution core: the
//! message record, the topic registry behind the event bus, the channel
//! filter and the topic routing rule shared by writers and sessions.

pub mod bus;
pub mod filter;
pub mod message;
pub mod routing;
pub mod topic;

pub use bus::{EventBus, Subscription};
pub use filter::ChannelFilter;
pub use message::{ChannelId, Message, MessageId};
pub use routing::{RoutingMode, topic_for};
