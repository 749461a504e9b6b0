use crate::Estimation;

use thiserror::Error;

/// Errors raised by team operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A participant with the same (case-insensitive) name is already in the team.
    #[error("a member or observer named '{0}' already exists in the team")]
    DuplicateName(String),

    /// The name of a team or participant is empty.
    #[error("name must not be empty")]
    EmptyName,

    /// The estimation is not part of the team's available estimations.
    #[error("estimation {0} is not available in this team")]
    EstimationNotAvailable(Estimation),

    /// A round of estimation is already running.
    #[error("estimation is already in progress in team '{0}'")]
    EstimationInProgress(String),

    /// The operation requires a running round of estimation.
    #[error("estimation is not in progress in team '{0}'")]
    EstimationNotInProgress(String),

    /// The estimation result has been finalized.
    #[error("estimation result is read-only")]
    EstimationResultReadOnly,

    /// The value cannot be used as an estimation.
    #[error("invalid estimation value {0}")]
    InvalidEstimation(f64),

    /// A snapshot describes a team that cannot exist.
    #[error("invalid team snapshot: {0}")]
    InvalidSnapshot(String),

    /// Timers must run for a positive duration.
    #[error("timer duration must be positive")]
    InvalidTimerDuration,

    /// The participant exists but is not a member.
    #[error("'{0}' is not a member of the team")]
    MemberNotFound(String),

    /// The participant is not the team's scrum master.
    #[error("'{0}' is not the scrum master of the team")]
    NotScrumMaster(String),

    /// No member or observer with the given name.
    #[error("no member or observer named '{0}'")]
    ParticipantNotFound(String),

    /// The team already has a scrum master.
    #[error("team already has scrum master '{0}'")]
    ScrumMasterAlreadySet(String),

    /// Snapshot (de)serialization failed.
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The deck name is not known.
    #[error("unknown deck '{0}'")]
    UnknownDeck(String),

    /// The symbolic estimation value is not known.
    #[error("unknown estimation symbol '{0}'")]
    UnknownEstimationSymbol(String),
}

impl Error {
    /// A stable, machine readable code for the error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateName(_) => "DUPLICATE_NAME",
            Self::EmptyName => "EMPTY_NAME",
            Self::EstimationNotAvailable(_) => "ESTIMATION_NOT_AVAILABLE",
            Self::EstimationInProgress(_) => "ESTIMATION_IN_PROGRESS",
            Self::EstimationNotInProgress(_) => "ESTIMATION_NOT_IN_PROGRESS",
            Self::EstimationResultReadOnly => "ESTIMATION_RESULT_READ_ONLY",
            Self::InvalidEstimation(_) => "INVALID_ESTIMATION",
            Self::InvalidSnapshot(_) => "INVALID_SNAPSHOT",
            Self::InvalidTimerDuration => "INVALID_TIMER_DURATION",
            Self::MemberNotFound(_) => "MEMBER_NOT_FOUND",
            Self::NotScrumMaster(_) => "NOT_SCRUM_MASTER",
            Self::ParticipantNotFound(_) => "PARTICIPANT_NOT_FOUND",
            Self::ScrumMasterAlreadySet(_) => "SCRUM_MASTER_ALREADY_SET",
            Self::Serialization(_) => "SERIALIZATION",
            Self::UnknownDeck(_) => "UNKNOWN_DECK",
            Self::UnknownEstimationSymbol(_) => "UNKNOWN_ESTIMATION_SYMBOL",
        }
    }
}
