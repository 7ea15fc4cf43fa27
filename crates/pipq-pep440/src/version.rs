use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The [PEP 440 appendix grammar](https://peps.python.org/pep-0440/#appendix-b-parsing-version-strings-with-regular-expressions),
/// with the post-release dash shorthand (`1.0-1`) folded in.
const VERSION_RE_INNER: &str = r"
v?
(?:(?P<epoch>[0-9]+)!)?                               # epoch
(?P<release>[0-9]+(?:\.[0-9]+)*)                      # release segment
(?:                                                   # pre-release
    [-_\.]?
    (?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)
    [-_\.]?
    (?P<pre_n>[0-9]+)?
)?
(?:                                                   # post release
    (?:-(?P<post_n1>[0-9]+))
    |
    (?:
        [-_\.]?
        (?P<post_l>post|rev|r)
        [-_\.]?
        (?P<post_n2>[0-9]+)?
    )
)?
(?:                                                   # dev release
    [-_\.]?
    (?P<dev_l>dev)
    [-_\.]?
    (?P<dev_n>[0-9]+)?
)?
(?:\+(?P<local>[a-z0-9]+(?:[-_\.][a-z0-9]+)*))?       # local version
";

static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?xi)^\s*{VERSION_RE_INNER}\s*$")).unwrap());

/// One of `~=` `==` `!=` `<=` `>=` `<` `>` `===`
#[derive(Eq, PartialEq, Debug, Hash, Clone, Copy)]
pub enum Operator {
    /// `== 1.2.3`
    Equal,
    /// `== 1.2.*`
    EqualStar,
    /// `===` (discouraged)
    ///
    /// <https://peps.python.org/pep-0440/#arbitrary-equality>
    ExactEqual,
    /// `!= 1.2.3`
    NotEqual,
    /// `!= 1.2.*`
    NotEqualStar,
    /// `~=`
    TildeEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
}

impl FromStr for Operator {
    type Err = String;

    /// Notably, this does not know about star versions, it just assumes the base operator
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let operator = match s {
            "==" => Self::Equal,
            "===" => Self::ExactEqual,
            "!=" => Self::NotEqual,
            "~=" => Self::TildeEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessThanEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterThanEqual,
            // A single `=` is a generations-old pip mistake, give it a dedicated hint.
            "=" => {
                return Err("= is not a valid operator. Did you mean `==`?".to_string());
            }
            other => {
                return Err(format!(
                    "No such comparison operator '{other}', must be one of ~= == != <= >= < > ==="
                ));
            }
        };
        Ok(operator)
    }
}

impl Display for Operator {
    /// Note that `EqualStar` and `NotEqualStar` print without the star.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let operator = match self {
            Self::Equal | Self::EqualStar => "==",
            Self::ExactEqual => "===",
            Self::NotEqual | Self::NotEqualStar => "!=",
            Self::TildeEqual => "~=",
            Self::LessThan => "<",
            Self::LessThanEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanEqual => ">=",
        };
        write!(f, "{operator}")
    }
}

/// Optional prerelease modifier (alpha, beta or release candidate) appended to a version
///
/// <https://peps.python.org/pep-0440/#pre-releases>
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy, Ord, PartialOrd)]
pub enum PreRelease {
    /// alpha prerelease
    Alpha,
    /// beta prerelease
    Beta,
    /// release candidate prerelease
    Rc,
}

impl Display for PreRelease {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alpha => write!(f, "a"),
            Self::Beta => write!(f, "b"),
            Self::Rc => write!(f, "rc"),
        }
    }
}

/// A PEP 440 version, such as `1.19` or `4!1.2.3a8.post9.dev1+deadbeef`
///
/// Trailing zeroes in the release segment do not affect equality or ordering,
/// i.e. `1.0` equals `1.0.0`.
#[derive(Debug, Clone)]
pub struct Version {
    /// The [versioning epoch](https://peps.python.org/pep-0440/#version-epochs), normally 0
    pub epoch: u64,
    /// The number part of the version, such as `1.2.3` in `4!1.2.3a8`
    pub release: Vec<u64>,
    /// The [prerelease](https://peps.python.org/pep-0440/#pre-releases) and its number
    pub pre: Option<(PreRelease, u64)>,
    /// The [post release](https://peps.python.org/pep-0440/#post-releases) number
    pub post: Option<u64>,
    /// The [developmental release](https://peps.python.org/pep-0440/#developmental-releases) number
    pub dev: Option<u64>,
    /// A [local version label](https://peps.python.org/pep-0440/#local-version-identifiers),
    /// such as `deadbeef` in `1.2.3+deadbeef`. Carried verbatim, ignored for ordering.
    pub local: Option<String>,
}

impl Version {
    /// Construct a plain release-only version, such as `Version::new([3, 8])` for `3.8`.
    pub fn new(release: impl IntoIterator<Item = u64>) -> Self {
        Self {
            epoch: 0,
            release: release.into_iter().collect(),
            pre: None,
            post: None,
            dev: None,
            local: None,
        }
    }

    /// Whether the version carries a prerelease or developmental marker.
    pub fn any_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// The release segment with trailing zeroes removed, for equality and hashing.
    fn trimmed_release(&self) -> &[u64] {
        let mut end = self.release.len();
        while end > 1 && self.release[end - 1] == 0 {
            end -= 1;
        }
        &self.release[..end]
    }

    /// Phase rank: dev-only sorts below any prerelease, prereleases below the final
    /// release, per PEP 440.
    fn pre_key(&self) -> (u8, Option<(PreRelease, u64)>) {
        if self.pre.is_none() && self.post.is_none() && self.dev.is_some() {
            (0, None)
        } else if self.pre.is_some() {
            (1, self.pre)
        } else {
            (2, None)
        }
    }

    /// `1.0a1.dev1 < 1.0a1`, so a present dev segment sorts below an absent one.
    fn dev_key(&self) -> (bool, u64) {
        match self.dev {
            Some(n) => (false, n),
            None => (true, 0),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }
}

/// Error from parsing a PEP 440 version
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("Version `{version}` doesn't match PEP 440 rules")]
pub struct VersionParseError {
    /// The string that failed to parse
    pub version: String,
}

impl FromStr for Version {
    type Err = VersionParseError;

    /// Parse a PEP 440 version such as `1.19.a1` or `1.0+abc.5`.
    fn from_str(version: &str) -> Result<Self, Self::Err> {
        let captures = VERSION_RE
            .captures(version)
            .ok_or_else(|| VersionParseError {
                version: version.to_string(),
            })?;

        let number = |name: &str| -> u64 {
            captures
                .name(name)
                .map(|m| m.as_str().parse().unwrap_or(u64::MAX))
                .unwrap_or(0)
        };

        let epoch = number("epoch");
        let release = captures["release"]
            .split('.')
            .map(|segment| segment.parse().unwrap_or(u64::MAX))
            .collect();
        let pre = captures.name("pre_l").map(|pre_l| {
            let phase = match pre_l.as_str().to_ascii_lowercase().as_str() {
                "alpha" | "a" => PreRelease::Alpha,
                "beta" | "b" => PreRelease::Beta,
                _ => PreRelease::Rc,
            };
            (phase, number("pre_n"))
        });
        // A bare `post`/`rev` label implies `.post0`, similarly for `dev`.
        let post = if captures.name("post_n1").is_some() {
            Some(number("post_n1"))
        } else {
            captures.name("post_l").map(|_| number("post_n2"))
        };
        let dev = captures.name("dev_l").map(|_| number("dev_n"));
        let local = captures
            .name("local")
            .map(|local| local.as_str().to_string());

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }
}

impl Display for Version {
    /// The normalized representation
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release = self
            .release
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{release}")?;
        if let Some((phase, number)) = self.pre {
            write!(f, "{phase}{number}")?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{post}")?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{dev}")?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{local}")?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(de::Error::custom)
    }
}
