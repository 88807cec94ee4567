#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of a finished match, as reported by an arena client.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "PascalCase")]
pub enum MatchOutcome {
    /// Participant 1 won cleanly.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Player1Win"))]
    Player1Win,
    /// Participant 2 won cleanly.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Player2Win"))]
    Player2Win,
    /// Participant 1 crashed; participant 2 takes the win.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Player1Crash"))]
    Player1Crash,
    /// Participant 2 crashed; participant 1 takes the win.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Player2Crash"))]
    Player2Crash,
    /// Participant 1 exceeded the in-game time limit; participant 2 takes the win.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Player1TimeOut"))]
    Player1TimeOut,
    /// Participant 2 exceeded the in-game time limit; participant 1 takes the win.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Player2TimeOut"))]
    Player2TimeOut,
    /// Neither side won. Scored as 0.5 for rating purposes.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Tie"))]
    Tie,
    /// The match never got off the ground on the arena client. Not rated.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "InitializationError"))]
    InitializationError,
    /// Force-cancelled, either administratively or by the timeout sweep. Not rated.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "MatchCancelled"))]
    MatchCancelled,
    /// The arena client failed in an undefined way. There is no winner mapping
    /// for this outcome, so the progression tracker rejects it as a hard fault.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Error"))]
    Error,
}

impl MatchOutcome {
    /// The winning participant number (1 or 2), if this outcome defines one.
    pub fn winner_participant(&self) -> Option<i32> {
        match self {
            Self::Player1Win | Self::Player2Crash | Self::Player2TimeOut => Some(1),
            Self::Player2Win | Self::Player1Crash | Self::Player1TimeOut => Some(2),
            Self::Tie | Self::InitializationError | Self::MatchCancelled | Self::Error => None,
        }
    }

    /// Returns true if the match ended with neither side winning.
    pub fn is_tie(&self) -> bool {
        matches!(self, Self::Tie)
    }

    /// Returns true if this outcome participates in rating updates and
    /// match counting. Cancelled and never-started matches do not.
    pub fn counts_for_rating(&self) -> bool {
        !matches!(self, Self::MatchCancelled | Self::InitializationError)
    }

    /// All possible outcome values.
    pub const ALL: &'static [MatchOutcome] = &[
        Self::Player1Win,
        Self::Player2Win,
        Self::Player1Crash,
        Self::Player2Crash,
        Self::Player1TimeOut,
        Self::Player2TimeOut,
        Self::Tie,
        Self::InitializationError,
        Self::MatchCancelled,
        Self::Error,
    ];

    /// Returns the string representation (PascalCase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player1Win => "Player1Win",
            Self::Player2Win => "Player2Win",
            Self::Player1Crash => "Player1Crash",
            Self::Player2Crash => "Player2Crash",
            Self::Player1TimeOut => "Player1TimeOut",
            Self::Player2TimeOut => "Player2TimeOut",
            Self::Tie => "Tie",
            Self::InitializationError => "InitializationError",
            Self::MatchCancelled => "MatchCancelled",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid outcome string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcomeError {
    invalid: String,
}

impl fmt::Display for ParseOutcomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid outcome '{}'. Valid values: {}",
            self.invalid,
            MatchOutcome::ALL
                .iter()
                .map(|o| o.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseOutcomeError {}

impl FromStr for MatchOutcome {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchOutcome::ALL
            .iter()
            .find(|o| o.as_str() == s)
            .copied()
            .ok_or_else(|| ParseOutcomeError {
                invalid: s.to_string(),
            })
    }
}
