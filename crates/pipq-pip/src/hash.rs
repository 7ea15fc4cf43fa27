use std::fmt::{Display, Formatter};
use std::path::Path;

use pipq_pep440::Version;

use crate::{call, ensure_pip_version, Error};

/// The algorithms `pip hash` accepts.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hashes a file with `pip hash`. The subcommand exists since pip 8.0.
pub fn hash(path: impl AsRef<Path>, algorithm: HashAlgorithm) -> Result<String, Error> {
    ensure_pip_version("pip hash", Version::new([8, 0, 0]))?;
    let path = path.as_ref().to_string_lossy();
    let output = call(&["hash", "--algorithm", algorithm.as_str(), path.as_ref()])?;
    parse_hash_output(&output)
}

/// The output is of the form `<filename>:\n--hash=<algorithm>:<digest>\n`.
fn parse_hash_output(output: &str) -> Result<String, Error> {
    output
        .trim()
        .rsplit(':')
        .next()
        .filter(|digest| !digest.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::UnexpectedOutput {
            output: output.trim().to_string(),
        })
}
