//! Unit status reported to the host.

use std::fmt;

/// Status of this unit as shown by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// The unit is waiting on something outside its control.
    Waiting(String),
    /// The unit is ready; the message may be empty.
    Active(String),
}

impl UnitStatus {
    /// An `Active` status with the given message.
    #[must_use]
    pub fn active(message: impl Into<String>) -> Self {
        Self::Active(message.into())
    }

    /// A `Waiting` status with the given message.
    #[must_use]
    pub fn waiting(message: impl Into<String>) -> Self {
        Self::Waiting(message.into())
    }

    /// The status name understood by `status-set`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Waiting(_) => "waiting",
            Self::Active(_) => "active",
        }
    }

    /// The status message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Waiting(message) | Self::Active(message) => message,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            f.write_str(self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}
