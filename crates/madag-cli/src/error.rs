/// CLI error types with associated exit codes.
///
/// [`CliError`] is the top-level error type for the `madag` binary. Every
/// variant maps to a stable exit code via [`CliError::exit_code`]:
///
/// - Exit code **1** — user error: a bad combination of flags, a request for
///   a feature the build does not carry.
/// - Exit code **2** — input/file I/O error: the tool could not read, parse,
///   or write a file at all.
/// - Exit code **3** — invariant violation at runtime: the loaded DAG, or an
///   operation performed on it, violates one of the data-model invariants.
use std::fmt;
use std::path::PathBuf;

use madag_core::MadagError;

/// All error conditions that the `madag` CLI can produce.
#[derive(Debug)]
pub enum CliError {
    // --- Exit code 1: user errors ---
    /// A flag combination or value is not sane (e.g. `--subtree-min` above
    /// `--subtree-max`, or an acceptance policy missing its coefficients).
    BadArguments {
        /// A description of what's wrong with the arguments.
        detail: String,
    },

    /// The requested operation needs a feature this build does not carry.
    UnsupportedFeature {
        /// The feature that was requested.
        detail: String,
    },

    // --- Exit code 2: input/file I/O failures ---
    /// A file argument could not be found on the filesystem.
    FileNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// The process lacks permission to read or write a file.
    PermissionDenied {
        /// The path that could not be accessed.
        path: PathBuf,
    },

    /// A generic I/O error not covered by the more specific variants above.
    IoError {
        /// A human-readable label for the source.
        source: String,
        /// The underlying I/O error message.
        detail: String,
    },

    /// The input bytes or text could not be parsed as the requested format.
    InputFormat {
        /// A human-readable label for the source.
        source: String,
        /// The underlying parse error message.
        detail: String,
    },

    /// The file's extension does not map to any supported format.
    UnknownExtension {
        /// The path whose extension was not recognized.
        path: PathBuf,
    },

    // --- Exit code 3: runtime invariant violations ---
    /// A loaded DAG, or the result of an operation on it, violates one of
    /// the data-model invariants.
    InvariantViolation {
        /// A description of the violated invariant.
        detail: String,
    },
}

impl CliError {
    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BadArguments { .. } | Self::UnsupportedFeature { .. } => 1,
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::IoError { .. }
            | Self::InputFormat { .. }
            | Self::UnknownExtension { .. } => 2,
            Self::InvariantViolation { .. } => 3,
        }
    }

    /// Returns a human-readable error message suitable for printing to stderr.
    pub fn message(&self) -> String {
        match self {
            Self::BadArguments { detail } => format!("error: {detail}"),
            Self::UnsupportedFeature { detail } => format!("error: unsupported feature: {detail}"),
            Self::FileNotFound { path } => format!("error: file not found: {}", path.display()),
            Self::PermissionDenied { path } => {
                format!("error: permission denied: {}", path.display())
            }
            Self::IoError { source, detail } => {
                format!("error: I/O error on {source}: {detail}")
            }
            Self::InputFormat { source, detail } => {
                format!("error: malformed input in {source}: {detail}")
            }
            Self::UnknownExtension { path } => {
                format!(
                    "error: cannot infer a file format from the extension of {}",
                    path.display()
                )
            }
            Self::InvariantViolation { detail } => format!("error: invariant violation: {detail}"),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CliError {}

/// Routes a core error into the CLI's exit-code buckets.
impl From<MadagError> for CliError {
    fn from(err: MadagError) -> CliError {
        match err {
            MadagError::InputFormat(detail) => CliError::InputFormat {
                source: "input".to_owned(),
                detail,
            },
            MadagError::InvalidBase(c) => CliError::InputFormat {
                source: "input".to_owned(),
                detail: format!("invalid base character '{c}'"),
            },
            MadagError::LengthMismatch { expected, actual } => CliError::InputFormat {
                source: "input".to_owned(),
                detail: format!("length mismatch: expected {expected}, got {actual}"),
            },
            MadagError::UnsupportedFeature(detail) => CliError::UnsupportedFeature { detail },
            MadagError::RefMismatch
            | MadagError::MissingSampleId { .. }
            | MadagError::InvariantViolation(_)
            | MadagError::IllegalMove(_)
            | MadagError::EmptyGraph
            | MadagError::UnreachableNode { .. } => CliError::InvariantViolation {
                detail: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::path::PathBuf;

    use super::*;

    #[test]
    fn bad_arguments_is_exit_1() {
        let e = CliError::BadArguments {
            detail: "subtree-min exceeds subtree-max".to_owned(),
        };
        assert_eq!(e.exit_code(), 1);
    }

    #[test]
    fn file_not_found_is_exit_2() {
        let e = CliError::FileNotFound {
            path: PathBuf::from("missing.json"),
        };
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn unknown_extension_is_exit_2() {
        let e = CliError::UnknownExtension {
            path: PathBuf::from("input.xyz"),
        };
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn invariant_violation_is_exit_3() {
        let e = CliError::InvariantViolation {
            detail: "edge mutation parent base does not match endpoint CG".to_owned(),
        };
        assert_eq!(e.exit_code(), 3);
    }

    #[test]
    fn from_madag_input_format_maps_to_exit_2() {
        let e: CliError = MadagError::InputFormat("bad header".to_owned()).into();
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn from_madag_illegal_move_maps_to_exit_3() {
        let e: CliError = MadagError::IllegalMove("src equals dst".to_owned()).into();
        assert_eq!(e.exit_code(), 3);
    }

    #[test]
    fn from_madag_unsupported_feature_maps_to_exit_1() {
        let e: CliError = MadagError::UnsupportedFeature("ml scoring".to_owned()).into();
        assert_eq!(e.exit_code(), 1);
    }

    #[test]
    fn display_matches_message() {
        let e = CliError::FileNotFound {
            path: PathBuf::from("x.json"),
        };
        assert_eq!(format!("{e}"), e.message());
    }

    #[test]
    fn error_trait_is_implemented() {
        let e: Box<dyn std::error::Error> = Box::new(CliError::InvariantViolation {
            detail: "test".to_owned(),
        });
        assert!(!e.to_string().is_empty());
    }
}
