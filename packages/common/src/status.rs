#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a competition.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum CompetitionStatus {
    /// Exists but has not been opened for play yet.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Created"))]
    Created,
    /// Accepting dispatch and generating new rounds.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Open"))]
    Open,
    /// Temporarily halted; existing matches keep their state but nothing is dispatched.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Paused"))]
    Paused,
    /// Draining: in-flight rounds are played out, no new rounds are generated.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Closing"))]
    Closing,
    /// Finished. All participants deactivated.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Closed"))]
    Closed,
    /// Archived by an operator outside the command set. Treated as not open.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Frozen"))]
    Frozen,
}

impl CompetitionStatus {
    /// True while new rounds may be generated.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// True while existing matches may still be handed to workers.
    pub fn accepts_dispatch(&self) -> bool {
        matches!(self, Self::Open | Self::Closing)
    }

    /// All possible status values.
    pub const ALL: &'static [CompetitionStatus] = &[
        Self::Created,
        Self::Open,
        Self::Paused,
        Self::Closing,
        Self::Closed,
        Self::Frozen,
    ];

    /// Returns the string representation (PascalCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Open => "Open",
            Self::Paused => "Paused",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
            Self::Frozen => "Frozen",
        }
    }
}

impl fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            CompetitionStatus::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for CompetitionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompetitionStatus::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ParseStatusError {
                invalid: s.to_string(),
            })
    }
}

/// Administrative command against a competition's lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AdminCommand {
    Open,
    Pause,
    Close,
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "Open",
            Self::Pause => "Pause",
            Self::Close => "Close",
        })
    }
}

/// A command was issued against a status it is not valid for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {command} to a {from} competition")]
pub struct InvalidTransition {
    pub from: CompetitionStatus,
    pub command: AdminCommand,
}

/// The competition lifecycle state machine.
///
/// Created -> Open <-> Paused; Open -> Closing. Closing -> Closed is not a
/// command: the progression tracker performs it once the last round drains.
/// Frozen has no inbound command and accepts none.
pub fn apply_command(
    from: CompetitionStatus,
    command: AdminCommand,
) -> Result<CompetitionStatus, InvalidTransition> {
    use AdminCommand as Cmd;
    use CompetitionStatus as S;

    match (from, command) {
        (S::Created, Cmd::Open) => Ok(S::Open),
        (S::Paused, Cmd::Open) => Ok(S::Open),
        (S::Open, Cmd::Pause) => Ok(S::Paused),
        (S::Open, Cmd::Close) => Ok(S::Closing),
        _ => Err(InvalidTransition { from, command }),
    }
}
