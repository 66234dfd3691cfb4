// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// Capture device not found, not recognized or inaccessible
    CameraNotFound(String),
    /// Device lacks a required capability or format
    Unsupported(String),
    /// No frame arrived in time
    Timeout(String),
    /// General error from the easycap library
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::CameraNotFound(msg) => write!(f, "Camera not found: {}", msg),
            CliError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            CliError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::CameraNotFound(_) => 3,
            CliError::Unsupported(_) => 4,
            CliError::Timeout(_) => 6,
            CliError::General(_) => 1,
        }
    }
}

/// Map easycap::Error to CliError with appropriate exit codes
impl From<easycap::Error> for CliError {
    fn from(err: easycap::Error) -> Self {
        use easycap::Error;

        match err {
            Error::DeviceUnavailable(_) | Error::DevicePermission(_) => {
                CliError::CameraNotFound(err.to_string())
            }

            Error::CapabilityUnsupported(_)
            | Error::FormatNegotiationFailed(_)
            | Error::InsufficientBuffers { .. } => CliError::Unsupported(err.to_string()),

            Error::InvalidSettings(msg) => CliError::InvalidArgs(msg),

            Error::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::NotFound => {
                    CliError::CameraNotFound(format!("Device not found: {}", io_err))
                }
                std::io::ErrorKind::TimedOut => {
                    CliError::Timeout(format!("Operation timed out: {}", io_err))
                }
                std::io::ErrorKind::PermissionDenied => {
                    CliError::CameraNotFound(format!("Permission denied: {}", io_err))
                }
                _ => CliError::General(format!("I/O error: {}", io_err)),
            },

            Error::MappingFailed { .. } | Error::InvalidState(_) => {
                CliError::General(err.to_string())
            }
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::InvalidArgs("test".into()).code(), 2);
        assert_eq!(CliError::CameraNotFound("test".into()).code(), 3);
        assert_eq!(CliError::Unsupported("test".into()).code(), 4);
        assert_eq!(CliError::Timeout("test".into()).code(), 6);
        assert_eq!(CliError::General("test".into()).code(), 1);
        assert_eq!(
            CliError::General("test".into()).exit_code(),
            ExitCode::from(1)
        );
    }

    #[test]
    fn test_library_error_mapping() {
        let err: CliError = easycap::Error::DeviceUnavailable(PathBuf::from("/dev/video9")).into();
        assert_eq!(err.code(), 3);

        let err: CliError = easycap::Error::InsufficientBuffers {
            requested: 1,
            granted: 0,
        }
        .into();
        assert_eq!(err.code(), 4);

        let err: CliError = easycap::Error::InvalidSettings("0x0".into()).into();
        assert_eq!(err.code(), 2);

        let err: CliError =
            easycap::Error::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)).into();
        assert_eq!(err.code(), 6);
    }

    #[test]
    fn test_error_display() {
        let err = CliError::CameraNotFound("/dev/video0".to_string());
        assert_eq!(format!("{}", err), "Camera not found: /dev/video0");
    }
}
