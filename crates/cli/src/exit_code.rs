// Consistent exit codes for the quire CLI.
//
//   0 = success
//   1 = general error
//   2 = usage/argument error
//   3 = path not found
//   4 = destination already exists

use crate::commands::CliError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotFound = 3,
    AlreadyExists = 4,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(cli_err) = cause.downcast_ref::<CliError>() {
                return match cli_err {
                    CliError::NotFound(_) => Self::NotFound,
                    CliError::AlreadyExists(_) => Self::AlreadyExists,
                    CliError::Unsupported(_) => Self::Usage,
                };
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::NotFound => Self::NotFound,
                    std::io::ErrorKind::AlreadyExists => Self::AlreadyExists,
                    _ => Self::Error,
                };
            }
        }
        Self::Error
    }
}
