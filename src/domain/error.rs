//! Domain error types.

/// Top-level error type for papertrade.
#[derive(Debug, thiserror::Error)]
pub enum PapertradeError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("must provide {field}")]
    MissingField { field: String },

    #[error("symbol does not exist: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("shares must be a positive whole number, got {value:?}")]
    InvalidShares { value: String },

    #[error("insufficient funds: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient shares of {symbol}: requested {requested}, holding {held}")]
    InsufficientShares {
        symbol: String,
        requested: i64,
        held: i64,
    },

    #[error("username taken: {username}")]
    UsernameTaken { username: String },

    #[error("password and confirmation do not match")]
    PasswordMismatch,

    #[error("invalid username and/or password")]
    InvalidCredentials,

    #[error("no such user: id {user_id}")]
    UnknownUser { user_id: i64 },

    #[error("password hashing failed: {reason}")]
    PasswordHash { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PapertradeError {
    /// True for errors caused by a malformed or semantically invalid user
    /// request, as opposed to an internal failure.
    pub fn is_rejectable_request(&self) -> bool {
        matches!(
            self,
            PapertradeError::MissingField { .. }
                | PapertradeError::UnknownSymbol { .. }
                | PapertradeError::InvalidShares { .. }
                | PapertradeError::InsufficientFunds { .. }
                | PapertradeError::InsufficientShares { .. }
                | PapertradeError::UsernameTaken { .. }
                | PapertradeError::PasswordMismatch
                | PapertradeError::InvalidCredentials
        )
    }
}

impl From<&PapertradeError> for std::process::ExitCode {
    fn from(err: &PapertradeError) -> Self {
        let code: u8 = match err {
            PapertradeError::Io(_) => 1,
            PapertradeError::ConfigParse { .. }
            | PapertradeError::ConfigMissing { .. }
            | PapertradeError::ConfigInvalid { .. } => 2,
            PapertradeError::Database { .. }
            | PapertradeError::DatabaseQuery { .. }
            | PapertradeError::UnknownUser { .. } => 3,
            PapertradeError::PasswordHash { .. } => 4,
            _ => 5,
        };
        std::process::ExitCode::from(code)
    }
}
