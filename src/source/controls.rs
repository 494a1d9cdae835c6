// Capability controls exposed by a capture source

use crate::format::FormatNegotiator;
use std::fmt;
use std::sync::Arc;

/// Closed set of capabilities a capture source can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Format negotiation
    Format,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Format => "format",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to one capability of a capture source
#[derive(Debug, Clone)]
pub enum Control {
    Format(Arc<FormatNegotiator>),
}

impl Control {
    pub fn kind(&self) -> ControlKind {
        match self {
            Control::Format(_) => ControlKind::Format,
        }
    }

    pub fn as_format(&self) -> Option<&Arc<FormatNegotiator>> {
        match self {
            Control::Format(negotiator) => Some(negotiator),
        }
    }
}

/// Fixed registry of the controls a source exposes
#[derive(Debug, Clone)]
pub struct ControlRegistry {
    controls: Vec<Control>,
}

impl ControlRegistry {
    pub fn new(controls: Vec<Control>) -> Self {
        Self { controls }
    }

    /// Owned copy of every control
    pub fn all(&self) -> Vec<Control> {
        self.controls.clone()
    }

    pub fn get(&self, kind: ControlKind) -> Option<Control> {
        self.controls.iter().find(|c| c.kind() == kind).cloned()
    }
}
