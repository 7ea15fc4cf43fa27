use std::str::FromStr;
use std::sync::OnceLock;

use pipq_pep440::Version;

use crate::{call, Error};

/// The pip version, queried once per process.
///
/// pip doesn't change under us mid-run, so the first successful answer is kept
/// for the lifetime of the process.
static PIP_VERSION: OnceLock<Version> = OnceLock::new();

/// Returns the version of the pip the configured Python runs.
pub fn version() -> Result<Version, Error> {
    if let Some(version) = PIP_VERSION.get() {
        return Ok(version.clone());
    }
    let output = call(&["--version"])?;
    let version = parse_version_output(&output)?;
    Ok(PIP_VERSION.get_or_init(|| version).clone())
}

/// The output is of the form `pip <version> from <directory> (python <version>)`.
fn parse_version_output(output: &str) -> Result<Version, Error> {
    let word = output
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| Error::UnexpectedOutput {
            output: output.trim().to_string(),
        })?;
    Ok(Version::from_str(word)?)
}

#[cfg(test)]
mod tests {
    use super::parse_version_output;

    #[test]
    fn version_line() {
        let version = parse_version_output(
            "pip 23.3.2 from /usr/lib/python3/dist-packages/pip (python 3.11)\n",
        )
        .unwrap();
        assert_eq!(version.to_string(), "23.3.2");
    }

    #[test]
    fn garbage() {
        assert!(parse_version_output("pip").is_err());
        assert!(parse_version_output("pip not-a-version from nowhere").is_err());
    }
}
