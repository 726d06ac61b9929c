#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    #[error("Rotation '{0}' not found")]
    RotationNotFound(String),

    #[error("Rotation '{0}' has no playable maps")]
    EmptyRotation(String),

    #[error("No enabled rotation is eligible for {participants} players")]
    NoEligibleRotation { participants: u32 },

    #[error("Map '{map}' is not part of rotation '{rotation}'")]
    MapNotInRotation { rotation: String, map: String },

    #[error("Rotation state lock poisoned: {0}")]
    LockPoisoned(String),
}
