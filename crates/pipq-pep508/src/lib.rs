//! A library for python [dependency specifiers](https://packaging.python.org/en/latest/specifications/dependency-specifiers/),
//! better known as [PEP 508](https://peps.python.org/pep-0508/).
//!
//! ```rust
//! use std::str::FromStr;
//! use pipq_pep508::Requirement;
//! use pipq_normalize::ExtraName;
//!
//! let requirement = Requirement::from_str(
//!     r#"requests [security,tests] >= 2.8.1, == 2.8.* ; python_version > "3.8""#,
//! ).unwrap();
//! assert_eq!(requirement.name.as_ref(), "requests");
//! assert_eq!(
//!     requirement.extras,
//!     vec![ExtraName::from_str("security").unwrap(), ExtraName::from_str("tests").unwrap()],
//! );
//! ```

use std::fmt::{Display, Formatter};
use std::str::{Chars, FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use unicode_width::UnicodeWidthChar;
use url::Url;

pub use marker::{
    MarkerEnvironment, MarkerExpression, MarkerOperator, MarkerTree, MarkerValue,
    MarkerValueString, MarkerValueVersion, StringVersion,
};
use pipq_normalize::{ExtraName, PackageName};
use pipq_pep440::{VersionSpecifier, VersionSpecifiers};

mod marker;

/// Error with a span attached, for pretty-printing with the offending text underlined.
#[derive(Debug, Error)]
pub struct Pep508Error {
    /// The error message
    pub message: String,
    /// Span start, as a byte index into the input
    pub start: usize,
    /// Span length in bytes
    pub len: usize,
    /// The input string, so the span can be printed underlined
    pub input: String,
}

impl Display for Pep508Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let start_offset = self.input[..self.start]
            .chars()
            .flat_map(|c| c.width())
            .sum::<usize>();
        let underline_len = if self.start >= self.input.len() {
            1
        } else {
            self.input[self.start..(self.start + self.len).min(self.input.len())]
                .chars()
                .flat_map(|c| c.width())
                .sum::<usize>()
                .max(1)
        };
        write!(
            f,
            "{}\n{}\n{}{}",
            self.message,
            self.input,
            " ".repeat(start_offset),
            "^".repeat(underline_len)
        )
    }
}

/// A PEP 508 dependency specification, such as
/// `requests [security,tests] >= 2.8.1, == 2.8.* ; python_version > "3.8"`.
#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub struct Requirement {
    /// The normalized distribution name, such as `flask` in `Flask>=3`
    pub name: PackageName,
    /// The distribution name as written, kept for display
    pub verbatim_name: String,
    /// The list of extras, such as `security`, `tests` in `requests[security,tests]`
    pub extras: Vec<ExtraName>,
    /// The version specifiers or the direct reference URL, if any
    pub version_or_url: Option<VersionOrUrl>,
    /// The environment marker expression after `;`, if any
    pub marker: Option<MarkerTree>,
}

/// The version specifier set or URL to install.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub enum VersionOrUrl {
    /// A PEP 440 version specifier set
    VersionSpecifier(VersionSpecifiers),
    /// An installable URL
    Url(Url),
}

impl Requirement {
    /// Whether the requirement's marker (if any) applies in the given environment.
    pub fn evaluate_markers(&self, env: &MarkerEnvironment, extras: &[ExtraName]) -> bool {
        match &self.marker {
            Some(marker) => marker.evaluate(env, extras),
            None => true,
        }
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.verbatim_name)?;
        if !self.extras.is_empty() {
            write!(
                f,
                "[{}]",
                self.extras
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            )?;
        }
        match &self.version_or_url {
            Some(VersionOrUrl::VersionSpecifier(specifiers)) => {
                if !specifiers.is_empty() {
                    write!(f, "{specifiers}")?;
                }
            }
            Some(VersionOrUrl::Url(url)) => {
                write!(f, "@ {url}")?;
            }
            None => {}
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}

impl FromStr for Requirement {
    type Err = Pep508Error;

    /// Parse a [dependency specifier](https://packaging.python.org/en/latest/specifications/dependency-specifiers/).
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse(&mut Cursor::new(input))
    }
}

impl<'de> Deserialize<'de> for Requirement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(de::Error::custom)
    }
}

impl Serialize for Requirement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A cursor over the input chars, tracking the byte position.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    input: &'a str,
    chars: Chars<'a>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars(),
            pos: 0,
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn slice(&self, start: usize, len: usize) -> &str {
        &self.input[start..start + len]
    }

    pub(crate) fn peek(&self) -> Option<(usize, char)> {
        self.chars.clone().next().map(|char| (self.pos, char))
    }

    pub(crate) fn peek_char(&self) -> Option<char> {
        self.chars.clone().next()
    }

    pub(crate) fn eat_char(&mut self, token: char) -> Option<usize> {
        let (start_pos, peek_char) = self.peek()?;
        if peek_char == token {
            self.next();
            Some(start_pos)
        } else {
            None
        }
    }

    pub(crate) fn eat_whitespace(&mut self) {
        while let Some(char) = self.peek_char() {
            if char.is_whitespace() {
                self.next();
            } else {
                return;
            }
        }
    }

    pub(crate) fn next(&mut self) -> Option<(usize, char)> {
        let pos = self.pos;
        let char = self.chars.next()?;
        self.pos += char.len_utf8();
        Some((pos, char))
    }

    pub(crate) fn peek_while(&mut self, condition: impl Fn(char) -> bool) -> (usize, usize) {
        let peeker = self.chars.clone();
        let start = self.pos();
        let len = peeker
            .take_while(|c| condition(*c))
            .map(char::len_utf8)
            .sum();
        (start, len)
    }

    pub(crate) fn take_while(&mut self, condition: impl Fn(char) -> bool) -> (usize, usize) {
        let start = self.pos();
        let mut len = 0;
        while let Some(char) = self.peek_char() {
            if !condition(char) {
                break;
            }
            self.next();
            len += char.len_utf8();
        }
        (start, len)
    }

    pub(crate) fn next_expect_char(
        &mut self,
        expected: char,
        span_start: usize,
    ) -> Result<(), Pep508Error> {
        match self.next() {
            None => Err(Pep508Error {
                message: format!("Expected '{expected}', found end of dependency specification"),
                start: span_start,
                len: 1,
                input: self.to_string(),
            }),
            Some((_, value)) if value == expected => Ok(()),
            Some((pos, other)) => Err(Pep508Error {
                message: format!("Expected '{expected}', found '{other}'"),
                start: pos,
                len: other.len_utf8(),
                input: self.to_string(),
            }),
        }
    }
}

impl Display for Cursor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.input)
    }
}

/// Parse the name at the start of the specifier, returning both the normalized and the
/// verbatim form.
///
/// <https://peps.python.org/pep-0508/#names>
fn parse_name(cursor: &mut Cursor) -> Result<(PackageName, String), Pep508Error> {
    // ^([A-Z0-9]|[A-Z0-9][A-Z0-9._-]*[A-Z0-9])$ with re.IGNORECASE
    let mut name = String::new();
    if let Some((index, char)) = cursor.next() {
        if matches!(char, 'A'..='Z' | 'a'..='z' | '0'..='9') {
            name.push(char);
        } else {
            return Err(Pep508Error {
                message: format!(
                    "Expected package name starting with an alphanumeric character, found '{char}'"
                ),
                start: index,
                len: char.len_utf8(),
                input: cursor.to_string(),
            });
        }
    } else {
        return Err(Pep508Error {
            message: "Empty field is not allowed for PEP508".to_string(),
            start: 0,
            len: 1,
            input: cursor.to_string(),
        });
    }

    loop {
        match cursor.peek() {
            Some((index, char @ ('A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '-' | '_'))) => {
                name.push(char);
                cursor.next();
                // [.-_] can't be the final character
                if cursor.peek().is_none() && matches!(char, '.' | '-' | '_') {
                    return Err(Pep508Error {
                        message: format!(
                            "Package name must end with an alphanumeric character, not '{char}'"
                        ),
                        start: index,
                        len: char.len_utf8(),
                        input: cursor.to_string(),
                    });
                }
            }
            Some(_) | None => {
                let normalized = PackageName::new(name.clone())
                    .expect("`PackageName` validation should match PEP 508 parsing");
                return Ok((normalized, name));
            }
        }
    }
}

/// Parses extras in the `[extra1,extra2]` format.
fn parse_extras(cursor: &mut Cursor) -> Result<Vec<ExtraName>, Pep508Error> {
    let Some(bracket_pos) = cursor.eat_char('[') else {
        return Ok(vec![]);
    };
    let mut extras = Vec::new();

    loop {
        // wsp* before the identifier
        cursor.eat_whitespace();
        let mut buffer = String::new();
        let early_eof_error = Pep508Error {
            message: "Missing closing bracket (expected ']', found end of dependency specification)"
                .to_string(),
            start: bracket_pos,
            len: 1,
            input: cursor.to_string(),
        };

        // First char of the identifier
        match cursor.next() {
            Some((_, alphanumeric @ ('a'..='z' | 'A'..='Z' | '0'..='9'))) => {
                buffer.push(alphanumeric);
            }
            Some((pos, other)) => {
                return Err(Pep508Error {
                    message: format!(
                        "Expected an alphanumeric character starting the extra name, found '{other}'"
                    ),
                    start: pos,
                    len: other.len_utf8(),
                    input: cursor.to_string(),
                });
            }
            None => return Err(early_eof_error),
        }
        // identifier_end = letterOrDigit | (('-' | '_' | '.' )* letterOrDigit)
        let (start, len) = cursor
            .take_while(|char| matches!(char, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.'));
        buffer.push_str(cursor.slice(start, len));
        match cursor.peek() {
            Some((pos, char)) if char != ',' && char != ']' && !char.is_whitespace() => {
                return Err(Pep508Error {
                    message: format!(
                        "Invalid character in extras name, expected an alphanumeric character, \
                         '-', '_', '.', ',' or ']', found '{char}'"
                    ),
                    start: pos,
                    len: char.len_utf8(),
                    input: cursor.to_string(),
                });
            }
            _ => {}
        }
        // wsp* after the identifier
        cursor.eat_whitespace();
        // end or next identifier?
        match cursor.next() {
            Some((_, ',')) => {
                extras.push(
                    ExtraName::new(buffer)
                        .expect("`ExtraName` validation should match PEP 508 parsing"),
                );
            }
            Some((_, ']')) => {
                extras.push(
                    ExtraName::new(buffer)
                        .expect("`ExtraName` validation should match PEP 508 parsing"),
                );
                break;
            }
            Some((pos, other)) => {
                return Err(Pep508Error {
                    message: format!(
                        "Expected either ',' (separating extras) or ']' (ending the extras \
                         section), found '{other}'"
                    ),
                    start: pos,
                    len: other.len_utf8(),
                    input: cursor.to_string(),
                });
            }
            None => return Err(early_eof_error),
        }
    }

    Ok(extras)
}

/// Parse the URL after an `@`.
fn parse_url(cursor: &mut Cursor) -> Result<Url, Pep508Error> {
    // wsp*
    cursor.eat_whitespace();
    // <URI_reference>
    let (start, len) = cursor.take_while(|char| !char.is_whitespace());
    let url = cursor.slice(start, len);
    if url.is_empty() {
        return Err(Pep508Error {
            message: "Expected URL".to_string(),
            start,
            len: 1,
            input: cursor.to_string(),
        });
    }
    Url::parse(url).map_err(|err| Pep508Error {
        message: format!("Invalid URL: {err}"),
        start,
        len,
        input: cursor.to_string(),
    })
}

/// PEP 440 wrapper
fn parse_specifier(
    cursor: &Cursor,
    buffer: &str,
    start: usize,
    end: usize,
) -> Result<VersionSpecifier, Pep508Error> {
    VersionSpecifier::from_str(buffer).map_err(|err| Pep508Error {
        message: err.to_string(),
        start,
        len: end.saturating_sub(start).max(1),
        input: cursor.to_string(),
    })
}

/// Such as `>=1.19,<2.0`, either delimited by the end of the specifier or a `;` for the
/// marker part.
///
/// ```text
/// version_one (wsp* ',' version_one)*
/// ```
fn parse_version_specifier(cursor: &mut Cursor) -> Result<Option<VersionOrUrl>, Pep508Error> {
    let mut start = cursor.pos();
    let mut specifiers = Vec::new();
    let mut buffer = String::new();
    loop {
        match cursor.peek() {
            Some((end, ',')) => {
                let specifier = parse_specifier(cursor, &buffer, start, end)?;
                specifiers.push(specifier);
                buffer.clear();
                cursor.next();
                start = end + 1;
            }
            Some((_, ';')) | None => {
                let end = cursor.pos();
                let specifier = parse_specifier(cursor, &buffer, start, end)?;
                specifiers.push(specifier);
                return Ok(Some(VersionOrUrl::VersionSpecifier(
                    specifiers.into_iter().collect(),
                )));
            }
            Some((_, char)) => {
                buffer.push(char);
                cursor.next();
            }
        }
    }
}

/// Such as `(>=1.19,<2.0)`.
///
/// ```text
/// '(' version_one (wsp* ',' version_one)* ')'
/// ```
fn parse_version_specifier_parentheses(
    cursor: &mut Cursor,
) -> Result<Option<VersionOrUrl>, Pep508Error> {
    let brace_pos = cursor.pos();
    cursor.next();
    cursor.eat_whitespace();
    let mut start = cursor.pos();
    let mut specifiers = Vec::new();
    let mut buffer = String::new();
    loop {
        match cursor.next() {
            Some((end, ',')) => {
                let specifier = parse_specifier(cursor, &buffer, start, end)?;
                specifiers.push(specifier);
                buffer.clear();
                start = end + 1;
            }
            Some((end, ')')) => {
                let specifier = parse_specifier(cursor, &buffer, start, end)?;
                specifiers.push(specifier);
                return Ok(Some(VersionOrUrl::VersionSpecifier(
                    specifiers.into_iter().collect(),
                )));
            }
            Some((_, char)) => buffer.push(char),
            None => {
                return Err(Pep508Error {
                    message: "Missing closing parenthesis (expected ')', found end of dependency \
                              specification)"
                        .to_string(),
                    start: brace_pos,
                    len: 1,
                    input: cursor.to_string(),
                });
            }
        }
    }
}

/// Parse a [dependency specifier](https://packaging.python.org/en/latest/specifications/dependency-specifiers).
///
/// ```text
/// specification = wsp* name wsp* extras? wsp*
///     (('@' wsp* url) | ('(' versionspec ')') | versionspec)? wsp* (';' wsp* marker)? wsp*
/// ```
fn parse(cursor: &mut Cursor) -> Result<Requirement, Pep508Error> {
    // wsp*
    cursor.eat_whitespace();
    // name
    let (name, verbatim_name) = parse_name(cursor)?;
    // wsp*
    cursor.eat_whitespace();
    // extras?
    let extras = parse_extras(cursor)?;
    // wsp*
    cursor.eat_whitespace();

    // ( url_req | name_req )?
    let version_or_url = match cursor.peek_char() {
        Some('@') => {
            cursor.next();
            Some(VersionOrUrl::Url(parse_url(cursor)?))
        }
        Some('(') => parse_version_specifier_parentheses(cursor)?,
        Some('<' | '=' | '>' | '~' | '!') => parse_version_specifier(cursor)?,
        Some(';') | None => None,
        Some(other) => {
            return Err(Pep508Error {
                message: format!(
                    "Expected one of `@`, `(`, `<`, `=`, `>`, `~`, `!`, `;`, found `{other}`"
                ),
                start: cursor.pos(),
                len: other.len_utf8(),
                input: cursor.to_string(),
            });
        }
    };

    // wsp*
    cursor.eat_whitespace();
    // quoted_marker?
    let marker = if cursor.peek_char() == Some(';') {
        // Skip past the semicolon
        cursor.next();
        Some(marker::parse_markers_impl(cursor)?)
    } else {
        None
    };
    // wsp*
    cursor.eat_whitespace();
    if let Some((pos, char)) = cursor.next() {
        return Err(Pep508Error {
            message: if marker.is_none() {
                format!(r"Expected end of input or ';', found '{char}'")
            } else {
                format!(r"Expected end of input, found '{char}'")
            },
            start: pos,
            len: char.len_utf8(),
            input: cursor.to_string(),
        });
    }

    Ok(Requirement {
        name,
        verbatim_name,
        extras,
        version_or_url,
        marker,
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use indoc::indoc;

    use pipq_normalize::{ExtraName, PackageName};
    use pipq_pep440::{Operator, Version, VersionPattern, VersionSpecifier};

    use crate::marker::{MarkerExpression, MarkerOperator, MarkerTree, MarkerValue, MarkerValueVersion};
    use crate::{Requirement, VersionOrUrl};

    fn assert_err(input: &str, error: &str) {
        assert_eq!(Requirement::from_str(input).unwrap_err().to_string(), error);
    }

    #[test]
    fn error_empty() {
        assert_err(
            "",
            indoc! {"\
            Empty field is not allowed for PEP508

            ^"
            },
        );
    }

    #[test]
    fn error_start() {
        assert_err(
            "_name",
            indoc! {"
                Expected package name starting with an alphanumeric character, found '_'
                _name
                ^"
            },
        );
    }

    #[test]
    fn error_end() {
        assert_err(
            "name_",
            indoc! {"
                Package name must end with an alphanumeric character, not '_'
                name_
                    ^"
            },
        );
    }

    #[test]
    fn basic_examples() {
        let input = r#"requests[security,tests]>=2.8.1,==2.8.* ; python_version < '2.7'"#;
        let requests = Requirement::from_str(input).unwrap();
        let expected = Requirement {
            name: PackageName::from_str("requests").unwrap(),
            verbatim_name: "requests".to_string(),
            extras: vec![
                ExtraName::from_str("security").unwrap(),
                ExtraName::from_str("tests").unwrap(),
            ],
            version_or_url: Some(VersionOrUrl::VersionSpecifier(
                [
                    VersionSpecifier::new(
                        Operator::GreaterThanEqual,
                        VersionPattern::verbatim(Version::new([2, 8, 1])),
                    )
                    .unwrap(),
                    VersionSpecifier::new(
                        Operator::Equal,
                        VersionPattern::wildcard(Version::new([2, 8])),
                    )
                    .unwrap(),
                ]
                .into_iter()
                .collect(),
            )),
            marker: Some(MarkerTree::Expression(MarkerExpression {
                l_value: MarkerValue::MarkerEnvVersion(MarkerValueVersion::PythonVersion),
                operator: MarkerOperator::LessThan,
                r_value: MarkerValue::QuotedString("2.7".to_string()),
            })),
        };
        assert_eq!(requests, expected);
    }

    #[test]
    fn parenthesized_specifier() {
        let numpy = Requirement::from_str("numpy ( >=1.19 )").unwrap();
        assert_eq!(numpy.name.as_ref(), "numpy");
    }

    #[test]
    fn name_normalization() {
        let requirement = Requirement::from_str("Flask_Login==0.6.2").unwrap();
        assert_eq!(requirement.name.as_ref(), "flask-login");
        assert_eq!(requirement.verbatim_name, "Flask_Login");
        assert_eq!(requirement.to_string(), "Flask_Login==0.6.2");
    }

    #[test]
    fn url_requirement() {
        let requirement =
            Requirement::from_str("pip @ https://github.com/pypa/pip/archive/1.3.1.zip").unwrap();
        let Some(VersionOrUrl::Url(url)) = &requirement.version_or_url else {
            panic!("expected a url");
        };
        assert_eq!(url.as_str(), "https://github.com/pypa/pip/archive/1.3.1.zip");
    }

    #[test]
    fn url_requirement_no_spaces() {
        let requirement =
            Requirement::from_str("pip@git+https://github.com/pypa/pip.git#egg=pip").unwrap();
        assert!(matches!(
            requirement.version_or_url,
            Some(VersionOrUrl::Url(_))
        ));
    }

    #[test]
    fn single_equal_hint() {
        let err = Requirement::from_str("numpy=1.19").unwrap_err();
        assert!(
            err.to_string()
                .contains("= is not a valid operator. Did you mean `==`?"),
            "{err}"
        );
    }

    #[test]
    fn round_trip_simple() {
        for input in ["numpy==1.19", "requests[security]>=2.8.1,<3", "pip"] {
            let requirement = Requirement::from_str(input).unwrap();
            assert_eq!(requirement.to_string(), input);
        }
    }

    #[test]
    fn no_version_is_any_version() {
        let requirement = Requirement::from_str("pip").unwrap();
        assert!(requirement.version_or_url.is_none());
    }
}
