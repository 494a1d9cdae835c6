//! Capture target locators
//!
//! A locator has the form `protocol:remainder`, e.g. `imgstreaming:0`.
//! The remainder names the capture target and is interpreted by the grabber.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol used by desktop image-streaming locators
pub const IMAGE_STREAMING_PROTOCOL: &str = "imgstreaming";

/// Locator parse errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// No `:` between protocol and remainder
    MissingSeparator(String),
    /// Nothing before the `:`
    EmptyProtocol(String),
}

impl fmt::Display for LocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorError::MissingSeparator(value) => {
                write!(f, "Locator {:?} is missing the protocol separator ':'", value)
            }
            LocatorError::EmptyProtocol(value) => {
                write!(f, "Locator {:?} has an empty protocol", value)
            }
        }
    }
}

impl std::error::Error for LocatorError {}

/// Identifies the screen a capture source reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    value: String,
    split: usize,
}

impl Locator {
    pub fn parse(value: &str) -> Result<Self, LocatorError> {
        let split = value
            .find(':')
            .ok_or_else(|| LocatorError::MissingSeparator(value.to_string()))?;
        if split == 0 {
            return Err(LocatorError::EmptyProtocol(value.to_string()));
        }
        Ok(Self {
            value: value.to_string(),
            split,
        })
    }

    /// Locator for the given screen using the image-streaming protocol
    pub fn screen(index: u32) -> Self {
        let value = format!("{}:{}", IMAGE_STREAMING_PROTOCOL, index);
        Self {
            split: IMAGE_STREAMING_PROTOCOL.len(),
            value,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.value[..self.split]
    }

    pub fn remainder(&self) -> &str {
        &self.value[self.split + 1..]
    }

    /// Screen number named by the remainder, if it is one
    pub fn screen_index(&self) -> Option<usize> {
        self.remainder().trim().parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locator::parse(s)
    }
}

impl TryFrom<String> for Locator {
    type Error = LocatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Locator::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.value
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
