use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The seven ticket statuses, spelled on the wire exactly as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "On Hold")]
    OnHold,
    Blocked,
    Cancelled,
    Rejected,
    Completed,
}

impl Default for Status {
    fn default() -> Self {
        Self::Open
    }
}

impl Status {
    /// All statuses in board order.
    pub const ALL: [Self; 7] = [
        Self::Open,
        Self::InProgress,
        Self::OnHold,
        Self::Blocked,
        Self::Cancelled,
        Self::Rejected,
        Self::Completed,
    ];

    /// Stored spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::OnHold => "On Hold",
            Self::Blocked => "Blocked",
            Self::Cancelled => "Cancelled",
            Self::Rejected => "Rejected",
            Self::Completed => "Completed",
        }
    }

    /// Cancelled, Rejected and Completed: both lifecycle timestamps are
    /// expected to be populated.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Rejected | Self::Completed)
    }

    /// Position in [`Status::ALL`], used for status sorting.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::InProgress => 1,
            Self::OnHold => 2,
            Self::Blocked => 3,
            Self::Cancelled => 4,
            Self::Rejected => 5,
            Self::Completed => 6,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a status from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    pub got: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid status: '{}'", self.got)
    }
}

impl std::error::Error for ParseStatusError {}

fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .to_ascii_lowercase()
}

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "open" => Ok(Self::Open),
            "inprogress" => Ok(Self::InProgress),
            "onhold" => Ok(Self::OnHold),
            "blocked" => Ok(Self::Blocked),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseStatusError { got: s.to_string() }),
        }
    }
}
