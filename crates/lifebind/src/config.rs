#![forbid(unsafe_code)]

//! Channel configuration.

use std::borrow::Cow;

/// Label used when none is configured.
pub const DEFAULT_LABEL: &str = "event_channel";

/// Construction-time settings for an [`EventChannel`](crate::EventChannel).
///
/// # Example
///
/// ```
/// use lifebind::{ChannelConfig, EventChannel};
///
/// let config = ChannelConfig::default().with_label("resize").with_capacity(8);
/// let channel = EventChannel::<(u16, u16)>::with_config(config);
/// assert_eq!(channel.label(), "resize");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Name reported in log events and `Debug` output.
    pub label: Cow<'static, str>,
    /// Initial capacity of the subscriber list.
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            label: Cow::Borrowed(DEFAULT_LABEL),
            capacity: 0,
        }
    }
}

impl ChannelConfig {
    /// Set the channel label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the initial subscriber capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}
