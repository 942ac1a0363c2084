//! Exit codes for the CLI tool.

use zipsession::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Operation completed with warnings
pub const WARNING: i32 = 1;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Archive format error
pub const BAD_ARCHIVE: i32 = 3;
/// Wrong or missing password
pub const WRONG_PASSWORD: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Ctrl+C (128 + SIGINT)
pub const USER_INTERRUPT: i32 = 130;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Warning,
    FatalError,
    BadArchive,
    WrongPassword,
    IoError,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Warning => WARNING,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::WrongPassword => WRONG_PASSWORD,
            Self::IoError => IO_ERROR,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts a zipsession error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Io(_) => ExitCode::IoError,
        Error::NotFound(_) | Error::AlreadyExists { .. } => ExitCode::BadArgs,
        Error::Corrupt { .. } | Error::CrcMismatch { .. } => ExitCode::BadArchive,
        Error::WrongPassword { .. } | Error::NoPassword { .. } => ExitCode::WrongPassword,
        Error::UnsupportedMethod { .. } | Error::UnsupportedFeature { .. } => {
            ExitCode::BadArchive
        }
        Error::LimitExceeded { .. } | Error::InvalidArgument(_) | Error::ReadOnly => {
            ExitCode::BadArgs
        }
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipsession::Missing;

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            error_to_exit_code(&Error::NoPassword { entry_index: 0 }),
            ExitCode::WrongPassword
        );
        assert_eq!(
            error_to_exit_code(&Error::NotFound(Missing::Index(3))),
            ExitCode::BadArgs
        );
        assert_eq!(error_to_exit_code(&Error::SessionClosed), ExitCode::FatalError);
        assert_eq!(ExitCode::BadArchive.code(), BAD_ARCHIVE);
    }
}
