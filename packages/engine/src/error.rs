use ladder_common::{CompetitionStatus, InvalidTransition, MatchOutcome};
use sea_orm::DbErr;
use thiserror::Error;

/// Hard faults. Any of these aborts the in-flight transaction with no partial
/// state persisted and is surfaced to the caller/operators.
#[derive(Debug, Error)]
pub enum LadderError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),

    #[error("competition {0} not found")]
    CompetitionNotFound(i32),

    #[error("match {0} not found")]
    MatchNotFound(i32),

    #[error("agent {0} not known to the registry")]
    AgentNotFound(i32),

    #[error("map {0} not known to the registry")]
    MapNotFound(i32),

    #[error("agent {agent_id} is not enrolled in competition {competition_id}")]
    ParticipantNotFound { competition_id: i32, agent_id: i32 },

    #[error("competition {0} is {1} and not accepting participants")]
    EnrollmentClosed(i32, CompetitionStatus),

    #[error("match {0} already has a result")]
    ResultAlreadyRecorded(i32),

    #[error("match {0} has no result")]
    ResultNotFound(i32),

    #[error("match {0} was never started")]
    MatchNotStarted(i32),

    #[error("outcome {0} defines no winner but counts for rating")]
    NoWinnerMapping(MatchOutcome),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("registry error: {0}")]
    Registry(anyhow::Error),
}

impl From<anyhow::Error> for LadderError {
    fn from(err: anyhow::Error) -> Self {
        LadderError::Registry(err)
    }
}

/// Soft, per-competition reasons round generation can refuse. The dispatcher
/// logs these at debug and moves on to the next competition; they never
/// surface as an error to the caller.
#[derive(Debug, Error)]
pub enum GenerateRoundError {
    #[error("competition is {0}, not open")]
    CompetitionNotOpen(CompetitionStatus),

    #[error("no enabled maps")]
    NoEnabledMaps,

    #[error("not enough available agents ({available})")]
    NotEnoughAgents { available: usize },

    #[error("incomplete round limit reached ({limit})")]
    RoundLimitReached { limit: i32 },

    /// Not a soft condition: bubbled up as a hard fault by the dispatcher.
    #[error(transparent)]
    Hard(#[from] LadderError),
}

impl GenerateRoundError {
    /// Whether the dispatcher may swallow this and continue scanning.
    pub fn is_soft(&self) -> bool {
        !matches!(self, GenerateRoundError::Hard(_))
    }
}

impl From<DbErr> for GenerateRoundError {
    fn from(err: DbErr) -> Self {
        GenerateRoundError::Hard(LadderError::Db(err))
    }
}
