//! Runs pip in a subprocess and maps its output to typed results.
//!
//! The Python executable defaults to `python` and can be overridden with the
//! `PIPQ_PYTHON_LOCATION` environment variable. Options that older pip versions
//! don't support fail with [`Error::UnsupportedOption`] instead of a confusing
//! subprocess error.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

pub use crate::call::call;
pub use crate::hash::{hash, HashAlgorithm};
pub use crate::list::{installed_distributions, Distribution};
pub use crate::markers::marker_environment;
pub use crate::version::version;

use pipq_normalize::InvalidNameError;
use pipq_pep440::{Version, VersionParseError};

mod call;
mod hash;
mod list;
mod markers;
mod version;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to launch `{python}`")]
    Launch {
        python: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` failed with {status}\n--- stdout:\n{stdout}\n--- stderr:\n{stderr}")]
    ProcessExecution {
        command: String,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    #[error("`{option}` requires pip {required} or later, found {found}")]
    UnsupportedOption {
        option: &'static str,
        required: Version,
        found: Version,
    },
    #[error("Unexpected output from pip: `{output}`")]
    UnexpectedOutput { output: String },
    #[error("Failed to parse pip's JSON output")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Version(#[from] VersionParseError),
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),
}

/// Fails with [`Error::UnsupportedOption`] when the installed pip is older than
/// `required`.
fn ensure_pip_version(option: &'static str, required: Version) -> Result<(), Error> {
    check_pip_version(option, required, version::version()?)
}

fn check_pip_version(
    option: &'static str,
    required: Version,
    found: Version,
) -> Result<(), Error> {
    if found < required {
        return Err(Error::UnsupportedOption {
            option,
            required,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pipq_pep440::Version;

    use super::{check_pip_version, Error};

    #[test]
    fn old_pip_rejects_newer_options() {
        let err = check_pip_version("--path", Version::new([19, 2]), Version::new([18, 1]))
            .unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedOption { option: "--path", .. }),
            "{err}"
        );
        assert_eq!(
            err.to_string(),
            "`--path` requires pip 19.2 or later, found 18.1"
        );

        let err = check_pip_version("pip hash", Version::new([8, 0, 0]), Version::new([7, 1, 2]))
            .unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedOption { option: "pip hash", .. }),
            "{err}"
        );
    }

    #[test]
    fn current_pip_passes_the_gate() {
        check_pip_version("--path", Version::new([19, 2]), Version::new([19, 2])).unwrap();
        check_pip_version("pip hash", Version::new([8, 0, 0]), Version::new([23, 3, 2])).unwrap();
    }
}
