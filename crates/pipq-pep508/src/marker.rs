//! PEP 508 environment markers.
//!
//! Markers allow a requirement to apply only in specific environments (python version,
//! operating system, architecture, etc.), e.g. `importlib-metadata ; python_version < "3.8"`.
//! The marker grammar has some oversights (PEP 440 comparisons with lexicographic fallback),
//! so suspect comparisons are logged as warnings and evaluate to false.

use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use pipq_normalize::ExtraName;
use pipq_pep440::{Version, VersionPattern, VersionSpecifier};

use crate::{Cursor, Pep508Error};

/// Environment markers with a PEP 440 version as value, such as `python_version`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MarkerValueVersion {
    /// `implementation_version`
    ImplementationVersion,
    /// `python_full_version`
    PythonFullVersion,
    /// `python_version`
    PythonVersion,
}

impl MarkerValueVersion {
    fn as_str(self) -> &'static str {
        match self {
            Self::ImplementationVersion => "implementation_version",
            Self::PythonFullVersion => "python_full_version",
            Self::PythonVersion => "python_version",
        }
    }
}

impl Display for MarkerValueVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment markers with an arbitrary string as value, such as `sys_platform`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MarkerValueString {
    /// `implementation_name`
    ImplementationName,
    /// `os_name`
    OsName,
    /// `platform_machine`
    PlatformMachine,
    /// `platform_python_implementation`
    PlatformPythonImplementation,
    /// `platform_release`
    PlatformRelease,
    /// `platform_system`
    PlatformSystem,
    /// `platform_version`
    PlatformVersion,
    /// `sys_platform`
    SysPlatform,
}

impl MarkerValueString {
    fn as_str(self) -> &'static str {
        match self {
            Self::ImplementationName => "implementation_name",
            Self::OsName => "os_name",
            Self::PlatformMachine => "platform_machine",
            Self::PlatformPythonImplementation => "platform_python_implementation",
            Self::PlatformRelease => "platform_release",
            Self::PlatformSystem => "platform_system",
            Self::PlatformVersion => "platform_version",
            Self::SysPlatform => "sys_platform",
        }
    }
}

impl Display for MarkerValueString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dotted PEP 345 marker names, deprecated by PEP 508 but still accepted.
const DEPRECATED_MARKER_NAMES: &[(&str, &str)] = &[
    ("os.name", "os_name"),
    ("platform.machine", "platform_machine"),
    ("platform.python_implementation", "platform_python_implementation"),
    ("platform.version", "platform_version"),
    ("sys.platform", "sys_platform"),
];

/// One of the predefined environment values or a quoted string.
///
/// <https://packaging.python.org/en/latest/specifications/dependency-specifiers/#environment-markers>
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum MarkerValue {
    /// An environment marker with a PEP 440 version as value, such as `python_version`
    MarkerEnvVersion(MarkerValueVersion),
    /// An environment marker with an arbitrary string as value, such as `sys_platform`
    MarkerEnvString(MarkerValueString),
    /// `extra`. Special because it's user given rather than read from the environment
    Extra,
    /// A user given quoted string, such as `'3.8'` or `"windows"`
    QuotedString(String),
}

impl FromStr for MarkerValue {
    type Err = String;

    /// This is specifically for the reserved keys; the deprecated PEP 345 dotted names
    /// are accepted with a warning.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match DEPRECATED_MARKER_NAMES.iter().find(|(old, _)| *old == s) {
            Some((old, new)) => {
                warn!("{old} is deprecated in favor of {new}");
                new
            }
            None => s,
        };
        let value = match key {
            "implementation_name" => Self::MarkerEnvString(MarkerValueString::ImplementationName),
            "implementation_version" => {
                Self::MarkerEnvVersion(MarkerValueVersion::ImplementationVersion)
            }
            "os_name" => Self::MarkerEnvString(MarkerValueString::OsName),
            "platform_machine" => Self::MarkerEnvString(MarkerValueString::PlatformMachine),
            "platform_python_implementation" => {
                Self::MarkerEnvString(MarkerValueString::PlatformPythonImplementation)
            }
            "platform_release" => Self::MarkerEnvString(MarkerValueString::PlatformRelease),
            "platform_system" => Self::MarkerEnvString(MarkerValueString::PlatformSystem),
            "platform_version" => Self::MarkerEnvString(MarkerValueString::PlatformVersion),
            "python_full_version" => Self::MarkerEnvVersion(MarkerValueVersion::PythonFullVersion),
            "python_version" => Self::MarkerEnvVersion(MarkerValueVersion::PythonVersion),
            "sys_platform" => Self::MarkerEnvString(MarkerValueString::SysPlatform),
            "extra" => Self::Extra,
            _ => return Err(format!("Invalid key: {s}")),
        };
        Ok(value)
    }
}

impl Display for MarkerValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarkerEnvVersion(marker_value_version) => marker_value_version.fmt(f),
            Self::MarkerEnvString(marker_value_string) => marker_value_string.fmt(f),
            Self::Extra => f.write_str("extra"),
            Self::QuotedString(value) => write!(f, "'{value}'"),
        }
    }
}

/// How to compare key and value, such as by `==`, `>` or `not in`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MarkerOperator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessEqual,
    /// `~=`
    TildeEqual,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

impl MarkerOperator {
    /// Compare two versions, returning `None` for `in` and `not in`.
    fn to_pep440_operator(self) -> Option<pipq_pep440::Operator> {
        match self {
            Self::Equal => Some(pipq_pep440::Operator::Equal),
            Self::NotEqual => Some(pipq_pep440::Operator::NotEqual),
            Self::GreaterThan => Some(pipq_pep440::Operator::GreaterThan),
            Self::GreaterEqual => Some(pipq_pep440::Operator::GreaterThanEqual),
            Self::LessThan => Some(pipq_pep440::Operator::LessThan),
            Self::LessEqual => Some(pipq_pep440::Operator::LessThanEqual),
            Self::TildeEqual => Some(pipq_pep440::Operator::TildeEqual),
            Self::In | Self::NotIn => None,
        }
    }
}

impl FromStr for MarkerOperator {
    type Err = String;

    /// PEP 508 allows arbitrary whitespace between "not" and "in", and so do we.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s {
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessEqual,
            "~=" => Self::TildeEqual,
            "in" => Self::In,
            not_space_in
                if not_space_in
                    .strip_prefix("not")
                    .and_then(|space_in| space_in.strip_suffix("in"))
                    .map(|space| !space.is_empty() && space.trim().is_empty())
                    .unwrap_or_default() =>
            {
                Self::NotIn
            }
            other => return Err(format!("Invalid comparator: {other}")),
        };
        Ok(value)
    }
}

impl Display for MarkerOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::TildeEqual => "~=",
            Self::In => "in",
            Self::NotIn => "not in",
        })
    }
}

/// Helper type with a [`Version`] and its original text.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StringVersion {
    /// Original unchanged string
    pub string: String,
    /// Parsed version
    pub version: Version,
}

impl Serialize for StringVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.string)
    }
}

impl FromStr for StringVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            string: s.to_string(),
            version: Version::from_str(s).map_err(|e| e.to_string())?,
        })
    }
}

impl Display for StringVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.string.fmt(f)
    }
}

impl<'de> Deserialize<'de> for StringVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        Self::from_str(&string).map_err(serde::de::Error::custom)
    }
}

impl Deref for StringVersion {
    type Target = Version;

    fn deref(&self) -> &Self::Target {
        &self.version
    }
}

/// The marker values of a python interpreter, normally the current one.
///
/// <https://packaging.python.org/en/latest/specifications/dependency-specifiers/#environment-markers>
///
/// Some are [`StringVersion`] because we have to support version comparison.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct MarkerEnvironment {
    pub implementation_name: String,
    pub implementation_version: StringVersion,
    pub os_name: String,
    pub platform_machine: String,
    pub platform_python_implementation: String,
    pub platform_release: String,
    pub platform_system: String,
    pub platform_version: String,
    pub python_full_version: StringVersion,
    pub python_version: StringVersion,
    pub sys_platform: String,
}

impl MarkerEnvironment {
    /// Returns the PEP 440 version typed value of the key in this environment.
    fn get_version(&self, key: MarkerValueVersion) -> &Version {
        match key {
            MarkerValueVersion::ImplementationVersion => &self.implementation_version.version,
            MarkerValueVersion::PythonFullVersion => &self.python_full_version.version,
            MarkerValueVersion::PythonVersion => &self.python_version.version,
        }
    }

    /// Returns the stringly typed value of the key in this environment.
    fn get_string(&self, key: MarkerValueString) -> &str {
        match key {
            MarkerValueString::ImplementationName => &self.implementation_name,
            MarkerValueString::OsName => &self.os_name,
            MarkerValueString::PlatformMachine => &self.platform_machine,
            MarkerValueString::PlatformPythonImplementation => {
                &self.platform_python_implementation
            }
            MarkerValueString::PlatformRelease => &self.platform_release,
            MarkerValueString::PlatformSystem => &self.platform_system,
            MarkerValueString::PlatformVersion => &self.platform_version,
            MarkerValueString::SysPlatform => &self.sys_platform,
        }
    }
}

/// Represents one clause such as `python_version > "3.8"`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MarkerExpression {
    /// A name from the PEP 508 list or a quoted string
    pub l_value: MarkerValue,
    /// An operator, such as `>=` or `not in`
    pub operator: MarkerOperator,
    /// A name from the PEP 508 list or a quoted string
    pub r_value: MarkerValue,
}

/// A marker expression sorted into the comparisons PEP 508 actually defines:
/// one environment key against one quoted string, in either order, or an
/// extra check. Everything else is bogus.
enum MarkerComparison<'a> {
    /// `python_version < "3.8"` or `"3.8" > python_version`
    Version {
        key: MarkerValueVersion,
        quoted: &'a str,
        key_on_left: bool,
    },
    /// `sys_platform == "linux"` or `"linux" == sys_platform`
    String {
        key: MarkerValueString,
        quoted: &'a str,
        key_on_left: bool,
    },
    /// `extra == "security"` or `"security" == extra`
    Extra { quoted: &'a str },
}

impl MarkerExpression {
    /// Sort the operand pair into a defined comparison, `None` when both sides
    /// are keys or both are quoted strings.
    fn comparison(&self) -> Option<MarkerComparison> {
        use MarkerValue::{Extra, MarkerEnvString, MarkerEnvVersion, QuotedString};
        match (&self.l_value, &self.r_value) {
            (MarkerEnvVersion(key), QuotedString(quoted)) => Some(MarkerComparison::Version {
                key: *key,
                quoted,
                key_on_left: true,
            }),
            (QuotedString(quoted), MarkerEnvVersion(key)) => Some(MarkerComparison::Version {
                key: *key,
                quoted,
                key_on_left: false,
            }),
            (MarkerEnvString(key), QuotedString(quoted)) => Some(MarkerComparison::String {
                key: *key,
                quoted,
                key_on_left: true,
            }),
            (QuotedString(quoted), MarkerEnvString(key)) => Some(MarkerComparison::String {
                key: *key,
                quoted,
                key_on_left: false,
            }),
            (Extra, QuotedString(quoted)) | (QuotedString(quoted), Extra) => {
                Some(MarkerComparison::Extra { quoted })
            }
            _ => None,
        }
    }

    /// Evaluate a `<marker_value> <marker_op> <marker_value>` expression.
    ///
    /// Bogus comparisons (such as comparing two env keys with each other) warn and
    /// evaluate to false.
    fn evaluate(&self, env: &MarkerEnvironment, extras: &[ExtraName]) -> bool {
        let Some(comparison) = self.comparison() else {
            warn!(
                "Comparing {} with {} doesn't make sense, evaluating to false",
                self.l_value, self.r_value
            );
            return false;
        };
        match comparison {
            MarkerComparison::Version {
                key,
                quoted,
                key_on_left,
            } => self.compare_versions(env.get_version(key), quoted, key_on_left),
            MarkerComparison::String {
                key,
                quoted,
                key_on_left,
            } => {
                if key_on_left {
                    self.compare_strings(env.get_string(key), quoted)
                } else {
                    self.compare_strings(quoted, env.get_string(key))
                }
            }
            MarkerComparison::Extra { quoted } => match ExtraName::from_str(quoted) {
                Ok(extra) => self.compare_extra(&extra, extras),
                Err(err) => {
                    warn!("Expected extra name, found '{quoted}', evaluating to false: {err}");
                    false
                }
            },
        }
    }

    /// Compare the environment's version for a key with a quoted PEP 440 version.
    ///
    /// The quoted side may be a `.*` pattern when the key is on the left; with the
    /// key on the right, the environment version becomes the specifier instead.
    fn compare_versions(&self, env_version: &Version, quoted: &str, key_on_left: bool) -> bool {
        let Some(operator) = self.operator.to_pep440_operator() else {
            warn!(
                "Expected a PEP 440 version operator to compare with '{quoted}', found \
                 '{}', evaluating to false",
                self.operator
            );
            return false;
        };
        let (pattern, candidate) = if key_on_left {
            let pattern = match quoted.parse::<VersionPattern>() {
                Ok(pattern) => pattern,
                Err(err) => {
                    warn!(
                        "Expected a quoted PEP 440 version, found '{quoted}', evaluating to \
                         false: {err}"
                    );
                    return false;
                }
            };
            (pattern, env_version.clone())
        } else {
            let candidate = match Version::from_str(quoted) {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(
                        "Expected a quoted PEP 440 version, found '{quoted}', evaluating to \
                         false: {err}"
                    );
                    return false;
                }
            };
            (VersionPattern::verbatim(env_version.clone()), candidate)
        };
        match VersionSpecifier::new(operator, pattern) {
            Ok(specifier) => specifier.contains(&candidate),
            Err(err) => {
                warn!("Invalid operator/version combination: {err}");
                false
            }
        }
    }

    /// Compare strings by PEP 508 logic, with warnings for lexicographic comparisons.
    fn compare_strings(&self, l_string: &str, r_string: &str) -> bool {
        let lexicographic = |holds: bool| {
            warn!("Comparing {l_string} and {r_string} lexicographically");
            holds
        };
        match self.operator {
            MarkerOperator::Equal => l_string == r_string,
            MarkerOperator::NotEqual => l_string != r_string,
            MarkerOperator::GreaterThan => lexicographic(l_string > r_string),
            MarkerOperator::GreaterEqual => lexicographic(l_string >= r_string),
            MarkerOperator::LessThan => lexicographic(l_string < r_string),
            MarkerOperator::LessEqual => lexicographic(l_string <= r_string),
            MarkerOperator::TildeEqual => {
                warn!("Can't compare {l_string} and {r_string} with `~=`");
                false
            }
            MarkerOperator::In => r_string.contains(l_string),
            MarkerOperator::NotIn => !r_string.contains(l_string),
        }
    }

    /// The `extra <op> '...'` comparison.
    fn compare_extra(&self, value: &ExtraName, extras: &[ExtraName]) -> bool {
        match self.operator {
            MarkerOperator::Equal => extras.contains(value),
            MarkerOperator::NotEqual => !extras.contains(value),
            _ => {
                warn!(
                    "Comparing extra with something other than equal (`==`) or unequal (`!=`) \
                     is wrong, evaluating to false"
                );
                false
            }
        }
    }
}

impl FromStr for MarkerExpression {
    type Err = Pep508Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = Cursor::new(s);
        let expression = parse_marker_key_op_value(&mut chars)?;
        chars.eat_whitespace();
        if let Some((pos, unexpected)) = chars.next() {
            return Err(Pep508Error {
                message: format!("Unexpected character '{unexpected}', expected end of input"),
                start: pos,
                len: unexpected.len_utf8(),
                input: chars.to_string(),
            });
        }
        Ok(expression)
    }
}

impl Display for MarkerExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.l_value, self.operator, self.r_value)
    }
}

/// Represents one of the nested marker expressions with and/or/parentheses.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum MarkerTree {
    /// A simple expression such as `python_version > "3.8"`
    Expression(MarkerExpression),
    /// An and between nested expressions, such as
    /// `python_version > "3.8" and implementation_name == 'cpython'`
    And(Vec<MarkerTree>),
    /// An or between nested expressions, such as
    /// `python_version > "3.8" or implementation_name == 'cpython'`
    Or(Vec<MarkerTree>),
}

impl FromStr for MarkerTree {
    type Err = Pep508Error;

    fn from_str(markers: &str) -> Result<Self, Self::Err> {
        parse_markers_impl(&mut Cursor::new(markers))
    }
}

impl MarkerTree {
    /// Does this marker apply in the given environment?
    pub fn evaluate(&self, env: &MarkerEnvironment, extras: &[ExtraName]) -> bool {
        match self {
            Self::Expression(expression) => expression.evaluate(env, extras),
            Self::And(expressions) => expressions.iter().all(|x| x.evaluate(env, extras)),
            Self::Or(expressions) => expressions.iter().any(|x| x.evaluate(env, extras)),
        }
    }
}

impl Display for MarkerTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let format_inner = |expression: &Self| {
            if matches!(expression, Self::Expression(_)) {
                format!("{expression}")
            } else {
                format!("({expression})")
            }
        };
        match self {
            Self::Expression(expression) => write!(f, "{expression}"),
            Self::And(and_list) => f.write_str(
                &and_list
                    .iter()
                    .map(format_inner)
                    .collect::<Vec<String>>()
                    .join(" and "),
            ),
            Self::Or(or_list) => f.write_str(
                &or_list
                    .iter()
                    .map(format_inner)
                    .collect::<Vec<String>>()
                    .join(" or "),
            ),
        }
    }
}

/// ```text
/// version_cmp   = wsp* <'<=' | '<' | '!=' | '==' | '>=' | '>' | '~='>
/// marker_op     = version_cmp | (wsp* 'in') | (wsp* 'not' wsp+ 'in')
/// ```
fn parse_marker_operator(cursor: &mut Cursor) -> Result<MarkerOperator, Pep508Error> {
    let (start, len) =
        cursor.take_while(|char| !char.is_whitespace() && char != '\'' && char != '"');
    let operator = cursor.slice(start, len);
    if operator == "not" {
        // 'not' wsp+ 'in'
        match cursor.next() {
            None => {
                return Err(Pep508Error {
                    message: "Expected whitespace after 'not', found end of input".to_string(),
                    start: cursor.pos(),
                    len: 1,
                    input: cursor.to_string(),
                });
            }
            Some((_, whitespace)) if whitespace.is_whitespace() => {}
            Some((pos, other)) => {
                return Err(Pep508Error {
                    message: format!("Expected whitespace after 'not', found '{other}'"),
                    start: pos,
                    len: other.len_utf8(),
                    input: cursor.to_string(),
                });
            }
        }
        cursor.eat_whitespace();
        cursor.next_expect_char('i', cursor.pos())?;
        cursor.next_expect_char('n', cursor.pos())?;
        return Ok(MarkerOperator::NotIn);
    }
    MarkerOperator::from_str(operator).map_err(|_| Pep508Error {
        message: format!(
            "Expected a valid marker operator (such as '>=' or 'not in'), found '{operator}'"
        ),
        start,
        len,
        input: cursor.to_string(),
    })
}

/// Either a single or double quoted string or one of the reserved environment keys.
fn parse_marker_value(cursor: &mut Cursor) -> Result<MarkerValue, Pep508Error> {
    match cursor.peek() {
        None => Err(Pep508Error {
            message: "Expected marker value, found end of dependency specification".to_string(),
            start: cursor.pos(),
            len: 1,
            input: cursor.to_string(),
        }),
        // It can be a string ...
        Some((start_pos, quotation_mark @ ('"' | '\''))) => {
            cursor.next();
            let (start, len) = cursor.take_while(|c| c != quotation_mark);
            let value = cursor.slice(start, len).to_string();
            cursor.next_expect_char(quotation_mark, start_pos)?;
            Ok(MarkerValue::QuotedString(value))
        }
        // ... or it can be a keyword
        Some(_) => {
            let (start, len) = cursor.take_while(|char| {
                !char.is_whitespace() && !['>', '=', '<', '!', '~', ')'].contains(&char)
            });
            let key = cursor.slice(start, len);
            MarkerValue::from_str(key).map_err(|_| Pep508Error {
                message: format!("Expected a valid marker name, found '{key}'"),
                start,
                len,
                input: cursor.to_string(),
            })
        }
    }
}

/// ```text
/// marker_var:l marker_op:o marker_var:r
/// ```
fn parse_marker_key_op_value(cursor: &mut Cursor) -> Result<MarkerExpression, Pep508Error> {
    cursor.eat_whitespace();
    let lvalue = parse_marker_value(cursor)?;
    cursor.eat_whitespace();
    let operator = parse_marker_operator(cursor)?;
    cursor.eat_whitespace();
    let rvalue = parse_marker_value(cursor)?;
    Ok(MarkerExpression {
        l_value: lvalue,
        operator,
        r_value: rvalue,
    })
}

/// ```text
/// marker_expr   = marker_var:l marker_op:o marker_var:r -> (o, l, r)
///               | wsp* '(' marker:m wsp* ')' -> m
/// ```
fn parse_marker_expr(cursor: &mut Cursor) -> Result<MarkerTree, Pep508Error> {
    cursor.eat_whitespace();
    if let Some(start_pos) = cursor.eat_char('(') {
        let marker = parse_marker_or(cursor)?;
        cursor.next_expect_char(')', start_pos)?;
        Ok(marker)
    } else {
        Ok(MarkerTree::Expression(parse_marker_key_op_value(cursor)?))
    }
}

/// ```text
/// marker_and    = marker_expr:l wsp* 'and' marker_expr:r -> ('and', l, r)
///               | marker_expr:m -> m
/// ```
fn parse_marker_and(cursor: &mut Cursor) -> Result<MarkerTree, Pep508Error> {
    parse_marker_op(cursor, "and", MarkerTree::And, parse_marker_expr)
}

/// ```text
/// marker_or     = marker_and:l wsp* 'or' marker_and:r -> ('or', l, r)
///               | marker_and:m -> m
/// ```
fn parse_marker_or(cursor: &mut Cursor) -> Result<MarkerTree, Pep508Error> {
    parse_marker_op(cursor, "or", MarkerTree::Or, parse_marker_and)
}

/// Parses both `marker_and` and `marker_or`.
fn parse_marker_op(
    cursor: &mut Cursor,
    op: &str,
    op_constructor: fn(Vec<MarkerTree>) -> MarkerTree,
    parse_inner: fn(&mut Cursor) -> Result<MarkerTree, Pep508Error>,
) -> Result<MarkerTree, Pep508Error> {
    // marker_and or marker_expr
    let first_element = parse_inner(cursor)?;
    // wsp*
    cursor.eat_whitespace();
    // Check if we're done here instead of invoking the whole vec allocating loop
    if matches!(cursor.peek_char(), None | Some(')')) {
        return Ok(first_element);
    }

    let mut expressions = Vec::with_capacity(1);
    expressions.push(first_element);
    loop {
        // wsp*
        cursor.eat_whitespace();
        // ('or' marker_and) or ('and' marker_or)
        let (start, len) = cursor.peek_while(|c| !c.is_whitespace());
        match cursor.slice(start, len) {
            value if value == op => {
                cursor.take_while(|c| !c.is_whitespace());
                let expression = parse_inner(cursor)?;
                expressions.push(expression);
            }
            _ => {
                // Build minimal trees
                return if expressions.len() == 1 {
                    Ok(expressions.remove(0))
                } else {
                    Ok(op_constructor(expressions))
                };
            }
        }
    }
}

/// ```text
/// marker        = marker_or
/// ```
pub(crate) fn parse_markers_impl(cursor: &mut Cursor) -> Result<MarkerTree, Pep508Error> {
    let marker = parse_marker_or(cursor)?;
    cursor.eat_whitespace();
    if let Some((pos, unexpected)) = cursor.next() {
        // If we're here, both parse_marker_or and parse_marker_and returned because the
        // next character was neither "and" nor "or"
        return Err(Pep508Error {
            message: format!(
                "Unexpected character '{unexpected}', expected 'and', 'or' or end of input"
            ),
            start: pos,
            len: unexpected.len_utf8(),
            input: cursor.to_string(),
        });
    }
    Ok(marker)
}
