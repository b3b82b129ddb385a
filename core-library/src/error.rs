use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    /// Stored filter rules of a child playlist could not be read.
    #[error("Invalid filter rules for child playlist {child_id}: {message}")]
    InvalidFilterRules { child_id: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl LibraryError {
    /// True when the underlying database error is a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            LibraryError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
