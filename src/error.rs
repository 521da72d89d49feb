use std::fmt;

use thiserror::Error;

/// User-facing messages for the failures this crate reports.
///
/// PartialEq allows comparing error variants in tests.
#[derive(Debug, PartialEq, Clone)]
pub enum ErrorMessage {
    // Password errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Relationship errors
    SelfSubscription,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::SelfSubscription => "You cannot subscribe to yourself".to_string(),
        };
        write!(f, "{}", message)
    }
}

impl std::error::Error for ErrorMessage {}

/// Failure of a repository operation.
///
/// Database errors are classified by kind so callers can tell a rejected
/// write (validation, uniqueness, constraint) from an infrastructure failure.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Password(#[from] ErrorMessage),

    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DbError::Validation(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let constraint = db_err
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db_err.message().to_string());

                if db_err.is_unique_violation() {
                    DbError::UniqueViolation(constraint)
                } else if db_err.is_check_violation() || db_err.is_foreign_key_violation() {
                    DbError::ConstraintViolation(constraint)
                } else {
                    DbError::Sqlx(sqlx::Error::Database(db_err))
                }
            }
            other => DbError::Sqlx(other),
        }
    }
}

/// Missing or unparsable environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::NotFound));
    }

    #[test]
    fn other_sqlx_errors_are_kept() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::PoolTimedOut)));
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn messages() {
        assert_eq!(
            ErrorMessage::ExceededMaxPasswordLength(64).to_string(),
            "Password must not be more than 64 characters"
        );
        let err = DbError::from(ErrorMessage::EmptyPassword);
        assert_eq!(err.to_string(), "Password cannot be empty");
        assert_eq!(
            ConfigError::Missing("DATABASE_URL").to_string(),
            "DATABASE_URL must be set"
        );
    }
}
