use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

use pipq_normalize::PackageName;
use pipq_pep440::Version;

use crate::extension::split_extension;

/// The name and version encoded in a wheel filename, such as
/// `pip-1.3.1-py2.py3-none-any.whl`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WheelFilename {
    pub name: PackageName,
    pub version: Version,
}

impl FromStr for WheelFilename {
    type Err = WheelFilenameError;

    fn from_str(filename: &str) -> Result<Self, Self::Err> {
        let (stem, extension) = split_extension(filename);
        if extension != ".whl" {
            return Err(WheelFilenameError::InvalidWheelFileName(
                filename.to_string(),
                "Must end with .whl".to_string(),
            ));
        }
        // https://packaging.python.org/en/latest/specifications/binary-distribution-format/#file-name-convention
        // The build tag makes the stem five or six fields wide.
        match stem.split('-').collect::<Vec<_>>().as_slice() {
            &[name, version, _, _python_tag, _abi_tag, _platform_tag]
            | &[name, version, _python_tag, _abi_tag, _platform_tag] => {
                let name = PackageName::from_str(name).map_err(|err| {
                    WheelFilenameError::InvalidWheelFileName(
                        filename.to_string(),
                        err.to_string(),
                    )
                })?;
                // Hyphens in the version are escaped as underscores in the filename
                let version =
                    Version::from_str(&version.replace('_', "-")).map_err(|err| {
                        WheelFilenameError::InvalidVersion(filename.to_string(), err.to_string())
                    })?;
                Ok(Self { name, version })
            }
            _ => Err(WheelFilenameError::InvalidWheelFileName(
                filename.to_string(),
                "Expected four or five \"-\" in the filename".to_string(),
            )),
        }
    }
}

impl Display for WheelFilename {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

#[derive(Error, Debug)]
pub enum WheelFilenameError {
    #[error("The wheel filename \"{0}\" is invalid: {1}")]
    InvalidWheelFileName(String, String),
    #[error("The wheel filename \"{0}\" has an invalid version part: {1}")]
    InvalidVersion(String, String),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::WheelFilename;

    #[test]
    fn ok_filenames() {
        let wheel = WheelFilename::from_str("pip-1.3.1-py2.py3-none-any.whl").unwrap();
        assert_eq!(wheel.name.as_str(), "pip");
        assert_eq!(wheel.version.to_string(), "1.3.1");

        let wheel =
            WheelFilename::from_str("cryptography-38.0.1-cp36-abi3-manylinux_2_28_x86_64.whl")
                .unwrap();
        assert_eq!(wheel.name.as_str(), "cryptography");
        assert_eq!(wheel.version.to_string(), "38.0.1");

        // Build tag
        let wheel = WheelFilename::from_str("foo_bar-1.0-1-py3-none-any.whl").unwrap();
        assert_eq!(wheel.name.as_str(), "foo-bar");
        assert_eq!(wheel.version.to_string(), "1.0");

        // Extension matching ignores case
        let wheel = WheelFilename::from_str("PIP-1.3.1-py2.py3-none-any.WHL").unwrap();
        assert_eq!(wheel.name.as_str(), "pip");
        assert_eq!(wheel.version.to_string(), "1.3.1");
    }

    #[test]
    fn err_filenames() {
        for filename in [
            "pip-1.3.1-py2.py3-none-any.zip",
            "pip-1.3.1-invalid-format.whl",
            "pip-not_a_version-py2.py3-none-any.whl",
        ] {
            assert!(WheelFilename::from_str(filename).is_err(), "{filename}");
        }
    }
}
