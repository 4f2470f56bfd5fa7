//! Topic routing
//!
//! Decides which bus topic a channel's messages travel on. `Shared` sends
//! everything through one topic and leaves selection to the channel filter;
//! `PerChannel` gives each channel its own topic so the bus only wakes the
//! sessions that can match. Writers and sessions must use the same mode.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::broker::message::ChannelId;

/// Topic used by every message in [`RoutingMode::Shared`].
pub const SHARED_TOPIC: &str = "message";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    Shared,
    PerChannel,
}

pub fn topic_for(mode: RoutingMode, channel: ChannelId) -> Cow<'static, str> {
    match mode {
        RoutingMode::Shared => Cow::Borrowed(SHARED_TOPIC),
        RoutingMode::PerChannel => Cow::Owned(format!("{SHARED_TOPIC}:{channel}")),
    }
}
