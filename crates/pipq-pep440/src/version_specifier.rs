use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::version::{Operator, Version};

/// A version number pattern, such as `1.2.3` or `1.2.*` in `==1.2.*`.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct VersionPattern {
    version: Version,
    wildcard: bool,
}

impl VersionPattern {
    /// Create a pattern without a wildcard.
    pub fn verbatim(version: Version) -> Self {
        Self {
            version,
            wildcard: false,
        }
    }

    /// Create a pattern with a wildcard, i.e. the `1.2.*` in `==1.2.*`.
    pub fn wildcard(version: Version) -> Self {
        Self {
            version,
            wildcard: true,
        }
    }

    /// Returns the version part of the pattern.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Whether the pattern ends in `.*`.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }
}

impl FromStr for VersionPattern {
    type Err = crate::VersionParseError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let trimmed = pattern.trim();
        if let Some(prefix) = trimmed.strip_suffix(".*") {
            Ok(Self::wildcard(Version::from_str(prefix)?))
        } else {
            Ok(Self::verbatim(Version::from_str(trimmed)?))
        }
    }
}

/// A version range such as `>1.2.3`, `<=2!1.2.3+deadbeef` or `== 1.0.*`.
///
/// ```rust
/// use std::str::FromStr;
/// use pipq_pep440::{Version, VersionSpecifier};
///
/// let version = Version::from_str("1.19").unwrap();
/// let version_specifier = VersionSpecifier::from_str("== 1.*").unwrap();
/// assert!(version_specifier.contains(&version));
/// ```
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct VersionSpecifier {
    /// `==`, `>=`, etc.; star variants fold the `.*` suffix into the operator
    operator: Operator,
    /// The whole version part behind the operator
    version: Version,
}

impl VersionSpecifier {
    /// Build a specifier from an already parsed operator and version pattern, checking
    /// that the combination is allowed by PEP 440.
    pub fn new(operator: Operator, pattern: VersionPattern) -> Result<Self, VersionSpecifierParseError> {
        let operator = if pattern.is_wildcard() {
            match operator {
                Operator::Equal => Operator::EqualStar,
                Operator::NotEqual => Operator::NotEqualStar,
                other => {
                    return Err(VersionSpecifierParseError {
                        message: format!(
                            "Operator {other} cannot be used with a wildcard version `.*`"
                        ),
                    });
                }
            }
        } else {
            operator
        };

        let version = pattern.version;
        if operator == Operator::TildeEqual && version.release.len() < 2 {
            return Err(VersionSpecifierParseError {
                message: "The ~= operator requires at least two segments in the release version"
                    .to_string(),
            });
        }

        Ok(Self { operator, version })
    }

    /// The comparison operator of the specifier.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The version the specifier compares against.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Whether the given version satisfies the specifier.
    pub fn contains(&self, version: &Version) -> bool {
        match self.operator {
            Operator::Equal => version == &self.version,
            Operator::EqualStar => self.matches_prefix(version),
            Operator::ExactEqual => version.to_string() == self.version.to_string(),
            Operator::NotEqual => version != &self.version,
            Operator::NotEqualStar => !self.matches_prefix(version),
            // `~= 2.2` is `>= 2.2, == 2.*`
            Operator::TildeEqual => {
                let mut prefix = self.version.release.clone();
                prefix.pop();
                version >= &self.version
                    && version.epoch == self.version.epoch
                    && version.release.iter().chain(std::iter::repeat(&0)).zip(&prefix).all(|(a, b)| a == b)
            }
            Operator::LessThan => version < &self.version,
            Operator::LessThanEqual => version <= &self.version,
            Operator::GreaterThan => version > &self.version,
            Operator::GreaterThanEqual => version >= &self.version,
        }
    }

    /// Matching for `== 1.2.*`: the epoch and every named release segment must agree,
    /// with the candidate release zero-padded as needed.
    fn matches_prefix(&self, version: &Version) -> bool {
        version.epoch == self.version.epoch
            && version
                .release
                .iter()
                .chain(std::iter::repeat(&0))
                .zip(&self.version.release)
                .all(|(a, b)| a == b)
    }
}

impl FromStr for VersionSpecifier {
    type Err = VersionSpecifierParseError;

    /// Parse a specifier such as `>=1.19` or `== 1.2.*`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        let operator_len = spec
            .chars()
            .take_while(|c| matches!(c, '=' | '!' | '~' | '<' | '>'))
            .count();
        let (operator, version_part) = spec.split_at(operator_len);
        let operator = Operator::from_str(operator)
            .map_err(|message| VersionSpecifierParseError { message })?;
        let pattern = VersionPattern::from_str(version_part).map_err(|err| {
            VersionSpecifierParseError {
                message: err.to_string(),
            }
        })?;
        Self::new(operator, pattern)
    }
}

impl Display for VersionSpecifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.operator, self.version)?;
        if matches!(self.operator, Operator::EqualStar | Operator::NotEqualStar) {
            write!(f, ".*")?;
        }
        Ok(())
    }
}

impl Serialize for VersionSpecifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpecifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}

/// Error from parsing or building a version specifier
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{message}")]
pub struct VersionSpecifierParseError {
    message: String,
}

/// An ordered set of version specifiers, such as `>=2.1,<3`.
#[derive(Debug, Clone, Default, Eq, Hash, PartialEq)]
pub struct VersionSpecifiers(Vec<VersionSpecifier>);

impl VersionSpecifiers {
    /// Whether all specifiers in the set are satisfied by the given version.
    pub fn contains(&self, version: &Version) -> bool {
        self.iter().all(|specifier| specifier.contains(version))
    }

    /// Whether the set is empty, i.e. any version is allowed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the specifiers in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &VersionSpecifier> {
        self.0.iter()
    }
}

impl FromIterator<VersionSpecifier> for VersionSpecifiers {
    fn from_iter<T: IntoIterator<Item = VersionSpecifier>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for VersionSpecifiers {
    type Err = VersionSpecifierParseError;

    /// Parse a comma-separated list of specifiers, such as `>=1.16, <2.0`.
    fn from_str(specifiers: &str) -> Result<Self, Self::Err> {
        let trimmed = specifiers.trim();
        if trimmed.is_empty() {
            return Ok(Self(Vec::new()));
        }
        trimmed
            .split(',')
            .map(VersionSpecifier::from_str)
            .collect()
    }
}

impl Display for VersionSpecifiers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let specifiers = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{specifiers}")
    }
}

impl Serialize for VersionSpecifiers {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpecifiers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}
