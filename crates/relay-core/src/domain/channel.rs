use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a bus channel (Redis pub/sub channel, topic, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Channel {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The three channels one extension talks on.
///
/// - `ready`: empty readiness signal, published once at start-up
/// - `input`: inbound task messages
/// - `output`: outbound completion envelopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channels {
    pub ready: Channel,
    pub input: Channel,
    pub output: Channel,
}

impl Channels {
    pub fn new(
        ready: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            ready: Channel::new(ready),
            input: Channel::new(input),
            output: Channel::new(output),
        }
    }
}
