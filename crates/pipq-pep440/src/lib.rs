//! A library for python [version numbers](https://packaging.python.org/en/latest/specifications/version-specifiers/)
//! and specifiers, originally specified in [PEP 440](https://peps.python.org/pep-0440/).
//!
//! ```rust
//! use std::str::FromStr;
//! use pipq_pep440::{Version, VersionSpecifiers};
//!
//! let version = Version::from_str("1.19").unwrap();
//! let version_specifiers = VersionSpecifiers::from_str(">=1.16, <2.0").unwrap();
//! assert!(version_specifiers.contains(&version));
//! ```

pub use version::{Operator, PreRelease, Version, VersionParseError};
pub use version_specifier::{
    VersionPattern, VersionSpecifier, VersionSpecifierParseError, VersionSpecifiers,
};

mod version;
mod version_specifier;
