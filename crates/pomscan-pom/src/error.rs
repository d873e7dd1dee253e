//! Errors for POM parsing and effective-model resolution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PomError {
    #[error("Failed to parse pom.xml: {message}")]
    Parse { message: String },

    #[error("POM at '{path}' has no resolvable coordinates")]
    MissingCoordinates { path: String },

    #[error("Module path '{path}' not found")]
    ModuleNotFound { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PomError::MissingCoordinates {
            path: "/tmp/pom.xml".into(),
        };
        assert!(err.to_string().contains("/tmp/pom.xml"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err: PomError = io.into();
        assert!(matches!(err, PomError::Io(_)));
    }
}
