//! Line-level preprocessing of requirements files: continuation joining, comment
//! stripping and splitting a logical line into options and the requirement itself.

use once_cell::sync::Lazy;
use regex::Regex;

/// A `#` at the start of a line or preceded by whitespace starts a comment.
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|\s)+#.*$").unwrap());

/// Joins continuation lines and strips comments, returning the non-empty logical
/// lines in file order.
///
/// A physical line ending in `\` joins with its successor; the logical line keeps
/// the number of its first physical line. An optional skip pattern drops matching
/// logical lines.
pub(crate) fn logical_lines(content: &str, skip_regex: Option<&Regex>) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current: Option<(usize, String)> = None;
    for (index, physical) in content.lines().enumerate() {
        let (lineno, mut joined) = match current.take() {
            Some((lineno, joined)) => (lineno, joined),
            None => (index + 1, String::new()),
        };
        if let Some(continued) = physical.strip_suffix('\\') {
            joined.push_str(continued);
            current = Some((lineno, joined));
            continue;
        }
        joined.push_str(physical);
        lines.push((lineno, joined));
    }
    // A trailing backslash on the last line has nothing to join with
    if let Some(last) = current {
        lines.push(last);
    }

    lines
        .into_iter()
        .map(|(lineno, line)| {
            let line = COMMENT_RE.replace(&line, "").trim().to_string();
            (lineno, line)
        })
        .filter(|(_, line)| !line.is_empty())
        .filter(|(_, line)| !skip_regex.is_some_and(|regex| regex.is_match(line)))
        .collect()
}

/// The options and requirement text recognized on one logical line.
#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ParsedLine {
    /// The remaining positional tokens, joined with single spaces
    pub(crate) requirement: Option<String>,
    /// `-r`/`--requirement` include target
    pub(crate) include: Option<String>,
    /// `-e`/`--editable` reference
    pub(crate) editable: Option<String>,
    /// Raw `--hash` values, `<kind>:<digest>` each, in order
    pub(crate) hashes: Vec<String>,
}

/// Splits a logical line on whitespace into recognized options and the
/// requirement string.
///
/// Index and host options (`-i`, `--index-url`, `--extra-index-url`, `-f`,
/// `--find-links`, `--trusted-host`) consume their value and are discarded so
/// they are never mistaken for packages. Unrecognized flags are ignored.
pub(crate) fn tokenize(line: &str) -> ParsedLine {
    let mut parsed = ParsedLine::default();
    let mut requirement = String::new();
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if !token.starts_with('-') {
            // A single space keeps `url ; marker` splittable downstream
            if !requirement.is_empty() {
                requirement.push(' ');
            }
            requirement.push_str(token);
            continue;
        }
        let (flag, inline_value) = match token.split_once('=') {
            Some((flag, value)) => (flag, Some(value.to_string())),
            None => (token, None),
        };
        let mut value = || inline_value.clone().or_else(|| tokens.next().map(str::to_string));
        match flag {
            "-r" | "--requirement" => parsed.include = value(),
            "-e" | "--editable" => parsed.editable = value(),
            "--hash" => parsed.hashes.extend(value()),
            "-i" | "--index-url" | "--extra-index-url" | "-f" | "--find-links"
            | "--trusted-host" => {
                value();
            }
            _ => {}
        }
    }
    if !requirement.is_empty() {
        parsed.requirement = Some(requirement);
    }
    parsed
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use regex::Regex;

    use super::{logical_lines, tokenize, ParsedLine};

    #[test]
    fn comments_and_blanks() {
        let content = indoc! {"
            # a full-line comment
            requests  # trailing comment

            flask
        "};
        assert_eq!(
            logical_lines(content, None),
            [(2, "requests".to_string()), (4, "flask".to_string())]
        );
    }

    #[test]
    fn continuations_number_from_first_physical_line() {
        let content = indoc! {r"
            requests \
                >= 2.8.1
            flask
        "};
        assert_eq!(
            logical_lines(content, None),
            [
                (1, "requests     >= 2.8.1".to_string()),
                (3, "flask".to_string())
            ]
        );
    }

    #[test]
    fn skip_regex_drops_lines() {
        let content = "requests\ninternal-package\nflask\n";
        let skip = Regex::new("internal").unwrap();
        assert_eq!(
            logical_lines(content, Some(&skip)),
            [(1, "requests".to_string()), (3, "flask".to_string())]
        );
    }

    #[test]
    fn options_and_positionals() {
        assert_eq!(
            tokenize("requests >= 2.8.1 --hash=sha256:abc --hash sha384:def"),
            ParsedLine {
                requirement: Some("requests >= 2.8.1".to_string()),
                hashes: vec!["sha256:abc".to_string(), "sha384:def".to_string()],
                ..ParsedLine::default()
            }
        );
        assert_eq!(
            tokenize("-r other-requirements.txt"),
            ParsedLine {
                include: Some("other-requirements.txt".to_string()),
                ..ParsedLine::default()
            }
        );
        assert_eq!(
            tokenize("-e ."),
            ParsedLine {
                editable: Some(".".to_string()),
                ..ParsedLine::default()
            }
        );
    }

    #[test]
    fn marker_keeps_its_separating_space() {
        assert_eq!(
            tokenize(r#"git+https://github.com/pypa/pip#egg=pip ; python_version > "3.6""#),
            ParsedLine {
                requirement: Some(
                    r#"git+https://github.com/pypa/pip#egg=pip ; python_version > "3.6""#
                        .to_string()
                ),
                ..ParsedLine::default()
            }
        );
    }

    #[test]
    fn index_options_are_consumed() {
        assert_eq!(
            tokenize("--index-url https://example.com/simple --trusted-host example.com"),
            ParsedLine::default()
        );
        assert_eq!(
            tokenize("-i https://example.com/simple requests"),
            ParsedLine {
                requirement: Some("requests".to_string()),
                ..ParsedLine::default()
            }
        );
    }
}
