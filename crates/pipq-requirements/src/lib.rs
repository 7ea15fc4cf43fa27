//! Parses requirements.txt files into a map of named requirements.
//!
//! <https://pip.pypa.io/en/stable/reference/requirements-file-format/>
//!
//! Supported:
//!  * [PEP 508 requirements](https://packaging.python.org/en/latest/specifications/dependency-specifiers/)
//!  * VCS, URL, local-directory, archive and wheel references
//!  * `-r`/`--requirement` includes, resolved against the including file
//!  * `-e`/`--editable`
//!  * `--hash` (postfix, repeatable)
//!  * Index and host options (`-i`, `--extra-index-url`, `-f`, `--trusted-host`),
//!    consumed and discarded
//!
//! Each requirement claims its normalized name in the result map; a second
//! definition of the same name is an error. Files parse in first-included-first
//! order, root first, so the map order and "first offending requirement" in
//! strict-hash mode are deterministic.

use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fs_err as fs;
use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::warn;

use pipq_filename::WheelFilenameError;
use pipq_pep508::{MarkerEnvironment, Pep508Error};

use crate::editable::parse_editable;
use crate::link::resolve_requirement_url;
use crate::lines::{logical_lines, tokenize};

mod editable;
mod link;
mod lines;

/// The hash algorithms pip accepts for `--hash`.
///
/// <https://pip.pypa.io/en/stable/cli/pip_hash/>
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum HashKind {
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl FromStr for HashKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(other.to_string()),
        }
    }
}

impl Display for HashKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requirement read from a requirements file, with its file-level metadata.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Requirement {
    /// The actual PEP 508 requirement
    pub pep508: pipq_pep508::Requirement,
    /// `--hash` digests by algorithm, in declaration order
    pub hashes: IndexMap<HashKind, Vec<String>>,
    /// Declared with `-e`/`--editable`
    pub editable: bool,
    /// The requirements file that declared the requirement
    pub path: PathBuf,
    /// Line in that file, counting physical lines
    pub lineno: usize,
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.editable {
            write!(f, "-e ")?;
        }
        write!(f, "{}", self.pep508)?;
        for (kind, digests) in &self.hashes {
            for digest in digests {
                write!(f, " --hash {kind}:{digest}")?;
            }
        }
        Ok(())
    }
}

/// A line that failed to parse, kept in permissive mode.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UnparsedRequirement {
    /// The requirement text as written
    pub name: String,
    /// Why it failed to parse
    pub message: String,
    pub path: PathBuf,
    pub lineno: usize,
}

impl Display for UnparsedRequirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Map value: a parsed requirement, or the raw line in permissive mode.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParsedRequirement {
    Valid(Requirement),
    Invalid(UnparsedRequirement),
}

impl ParsedRequirement {
    pub fn path(&self) -> &Path {
        match self {
            Self::Valid(requirement) => &requirement.path,
            Self::Invalid(unparsed) => &unparsed.path,
        }
    }

    pub fn lineno(&self) -> usize {
        match self {
            Self::Valid(requirement) => requirement.lineno,
            Self::Invalid(unparsed) => unparsed.lineno,
        }
    }
}

/// Options for [`parse_requirements`].
#[derive(Debug, Default)]
pub struct ParseOptions {
    /// Drop logical lines matching this pattern
    pub skip_regex: Option<Regex>,
    /// Keep unparsable lines as [`ParsedRequirement::Invalid`] instead of failing
    pub include_invalid: bool,
    /// Require a `--hash` on every requirement
    pub strict_hashes: bool,
    /// When set, requirements whose marker evaluates to false are dropped
    pub marker_env: Option<MarkerEnvironment>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid requirement in {} at line {lineno}: {source}", path.display())]
    MalformedSpecifier {
        path: PathBuf,
        lineno: usize,
        source: Pep508Error,
    },
    #[error(
        "Directory {} is not installable. Neither 'setup.py' nor 'pyproject.toml' found",
        path.display()
    )]
    InvalidLocalProject { path: PathBuf },
    #[error(transparent)]
    InvalidWheelName(#[from] WheelFilenameError),
    #[error("Could not detect requirement name for '{url}', please specify one with #egg=name")]
    MissingEggFragment { url: String },
    #[error("{given} is not installable: {reason}")]
    NotInstallable { given: String, reason: String },
    #[error(
        "Double requirement given: {name} in {} at line {lineno} (already in {} at line {existing_lineno})",
        path.display(),
        existing_path.display()
    )]
    DuplicateRequirement {
        name: String,
        path: PathBuf,
        lineno: usize,
        existing_path: PathBuf,
        existing_lineno: usize,
    },
    #[error(
        "Invalid --hash kind {kind} in {} at line {lineno}, expected one of sha256, sha384, sha512",
        path.display()
    )]
    InvalidHashKind {
        kind: String,
        path: PathBuf,
        lineno: usize,
    },
    #[error("Missing hashes for requirement in {}, line {lineno}", path.display())]
    MissingHashes { path: PathBuf, lineno: usize },
    #[error("Failed to parse URL: {url}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Parses a requirements file, following `-r` includes, into a map from
/// normalized package name to requirement.
///
/// The map preserves insertion order: root file first, included files in
/// encounter order. Unparsable lines fail the whole parse unless
/// [`ParseOptions::include_invalid`] is set, in which case they are kept under
/// their raw text.
pub fn parse_requirements(
    path: impl AsRef<Path>,
    options: &ParseOptions,
) -> Result<IndexMap<String, ParsedRequirement>, Error> {
    let root = std::path::absolute(path.as_ref())?;
    let mut to_parse = std::collections::VecDeque::new();
    let mut seen = FxHashSet::default();
    seen.insert(root.clone());
    to_parse.push_back(root);
    let mut results: IndexMap<String, ParsedRequirement> = IndexMap::new();

    while let Some(file) = to_parse.pop_front() {
        let dir = file.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let content = fs::read_to_string(&file)?;
        let lines = logical_lines(&content, options.skip_regex.as_ref());
        if lines.is_empty() {
            warn!(
                "Requirements file {} does not contain any requirements",
                file.display()
            );
        }
        for (lineno, line) in lines {
            let parsed_line = tokenize(&line);

            let mut hashes: IndexMap<HashKind, Vec<String>> = IndexMap::new();
            for raw in &parsed_line.hashes {
                let (kind, digest) = raw.split_once(':').ok_or_else(|| Error::InvalidHashKind {
                    kind: raw.clone(),
                    path: file.clone(),
                    lineno,
                })?;
                let kind = HashKind::from_str(kind).map_err(|kind| Error::InvalidHashKind {
                    kind,
                    path: file.clone(),
                    lineno,
                })?;
                hashes.entry(kind).or_default().push(digest.to_string());
            }

            let requirement = if let Some(req_str) = parsed_line.requirement {
                match parse_positional(&req_str, &dir, hashes, &file, lineno) {
                    Ok(requirement) => Some(requirement),
                    Err(err) if options.include_invalid => {
                        Some(ParsedRequirement::Invalid(UnparsedRequirement {
                            name: req_str,
                            message: err.to_string(),
                            path: file.clone(),
                            lineno,
                        }))
                    }
                    Err(err) => return Err(err),
                }
            } else if let Some(include) = parsed_line.include {
                let full = link::normalize_path(&dir.join(include));
                if seen.insert(full.clone()) {
                    to_parse.push_back(full);
                }
                None
            } else if let Some(editable) = parsed_line.editable {
                let (name, url) = parse_editable(&editable, &dir)?;
                let pep508 = pipq_pep508::Requirement::from_str(&format!("{name} @ {url}"))
                    .map_err(|source| Error::MalformedSpecifier {
                        path: file.clone(),
                        lineno,
                        source,
                    })?;
                Some(ParsedRequirement::Valid(Requirement {
                    pep508,
                    hashes: IndexMap::new(),
                    editable: true,
                    path: file.clone(),
                    lineno,
                }))
            } else {
                None
            };

            let Some(requirement) = requirement else {
                continue;
            };
            // A false marker drops the requirement before it claims its name
            if let (ParsedRequirement::Valid(valid), Some(env)) =
                (&requirement, &options.marker_env)
            {
                if !valid.pep508.evaluate_markers(env, &[]) {
                    continue;
                }
            }

            let key = match &requirement {
                ParsedRequirement::Valid(valid) => valid.pep508.name.to_string(),
                ParsedRequirement::Invalid(unparsed) => unparsed.name.clone(),
            };
            if let Some(existing) = results.get(&key) {
                return Err(Error::DuplicateRequirement {
                    name: key,
                    path: file.clone(),
                    lineno,
                    existing_path: existing.path().to_path_buf(),
                    existing_lineno: existing.lineno(),
                });
            }
            results.insert(key, requirement);
        }
    }

    if options.strict_hashes {
        let missing = results.values().find(|requirement| match requirement {
            ParsedRequirement::Valid(valid) => valid.hashes.is_empty(),
            ParsedRequirement::Invalid(_) => false,
        });
        if let Some(requirement) = missing {
            return Err(Error::MissingHashes {
                path: requirement.path().to_path_buf(),
                lineno: requirement.lineno(),
            });
        }
    }

    Ok(results)
}

/// Classifies and parses a positional requirement string from one line.
fn parse_positional(
    req_str: &str,
    dir: &Path,
    hashes: IndexMap<HashKind, Vec<String>>,
    file: &Path,
    lineno: usize,
) -> Result<ParsedRequirement, Error> {
    let resolved = resolve_requirement_url(req_str, dir)?;
    let pep508 =
        pipq_pep508::Requirement::from_str(&resolved).map_err(|source| Error::MalformedSpecifier {
            path: file.to_path_buf(),
            lineno,
            source,
        })?;
    Ok(ParsedRequirement::Valid(Requirement {
        pep508,
        hashes,
        editable: false,
        path: file.to_path_buf(),
        lineno,
    }))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::str::FromStr;

    use anyhow::Result;
    use fs_err as fs;
    use indexmap::IndexMap;
    use indoc::indoc;
    use regex::Regex;

    use pipq_pep508::{MarkerEnvironment, StringVersion, VersionOrUrl};

    use super::{parse_requirements, Error, HashKind, ParseOptions, ParsedRequirement};

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn parse(
        content: &str,
        options: &ParseOptions,
    ) -> Result<IndexMap<String, ParsedRequirement>, Error> {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "requirements.txt", content);
        parse_requirements(path, options)
    }

    fn valid(requirement: &ParsedRequirement) -> &super::Requirement {
        match requirement {
            ParsedRequirement::Valid(requirement) => requirement,
            ParsedRequirement::Invalid(unparsed) => {
                panic!("expected a parsed requirement: {unparsed}")
            }
        }
    }

    fn env37() -> MarkerEnvironment {
        MarkerEnvironment {
            implementation_name: "cpython".to_string(),
            implementation_version: StringVersion::from_str("3.7.13").unwrap(),
            os_name: "posix".to_string(),
            platform_machine: "x86_64".to_string(),
            platform_python_implementation: "CPython".to_string(),
            platform_release: "5.4.188".to_string(),
            platform_system: "Linux".to_string(),
            platform_version: "#1 SMP Sun Apr 24 10:03:06 PDT 2022".to_string(),
            python_full_version: StringVersion::from_str("3.7.13").unwrap(),
            python_version: StringVersion::from_str("3.7").unwrap(),
            sys_platform: "linux".to_string(),
        }
    }

    #[test]
    fn basic_requirements() -> Result<()> {
        let map = parse(
            indoc! {r#"
                # a comment
                requests[security] >= 2.8.1 ; python_version > "2.7"
                Django==2.0
            "#},
            &ParseOptions::default(),
        )?;
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            ["requests", "django"]
        );
        let requests = valid(&map["requests"]);
        assert_eq!(requests.lineno, 2);
        assert!(!requests.editable);
        assert!(requests.pep508.marker.is_some());
        let django = valid(&map["django"]);
        assert_eq!(django.pep508.verbatim_name, "Django");
        Ok(())
    }

    #[test]
    fn comments_only_yields_nothing() -> Result<()> {
        let map = parse("# nothing here\n\n   # still nothing\n", &ParseOptions::default())?;
        assert!(map.is_empty());
        Ok(())
    }

    #[test]
    fn includes_parse_first_included_first() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = write_file(
            dir.path(),
            "requirements.txt",
            "requests\n-r other.txt\nflask\n",
        );
        write_file(dir.path(), "other.txt", "django\n");
        let map = parse_requirements(root, &ParseOptions::default())?;
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            ["requests", "flask", "django"]
        );
        assert!(valid(&map["django"]).path.ends_with("other.txt"));
        Ok(())
    }

    #[test]
    fn duplicate_across_includes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = write_file(
            dir.path(),
            "requirements.txt",
            "requests==2.0\n-r other.txt\n",
        );
        write_file(dir.path(), "other.txt", "requests==3.0\n");
        let err = parse_requirements(root, &ParseOptions::default()).unwrap_err();
        let Error::DuplicateRequirement {
            name,
            existing_lineno,
            ..
        } = err
        else {
            panic!("expected a duplicate requirement error, got {err}");
        };
        assert_eq!(name, "requests");
        assert_eq!(existing_lineno, 1);
        Ok(())
    }

    #[test]
    fn include_cycle_terminates() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = write_file(dir.path(), "a.txt", "-r b.txt\nfoo\n");
        write_file(dir.path(), "b.txt", "-r a.txt\nbar\n");
        let map = parse_requirements(root, &ParseOptions::default())?;
        assert_eq!(map.keys().collect::<Vec<_>>(), ["foo", "bar"]);
        Ok(())
    }

    #[test]
    fn hashes_accumulate_in_order() -> Result<()> {
        let map = parse(
            "requests --hash=sha256:aaa --hash=sha256:bbb --hash sha384:ccc\n",
            &ParseOptions::default(),
        )?;
        let requests = valid(&map["requests"]);
        assert_eq!(
            requests.hashes[&HashKind::Sha256],
            ["aaa".to_string(), "bbb".to_string()]
        );
        assert_eq!(requests.hashes[&HashKind::Sha384], ["ccc".to_string()]);
        Ok(())
    }

    #[test]
    fn invalid_hash_kind() {
        let err = parse("requests --hash=md5:abc\n", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidHashKind { ref kind, .. } if kind == "md5"));
    }

    #[test]
    fn strict_hashes() -> Result<()> {
        let options = ParseOptions {
            strict_hashes: true,
            ..ParseOptions::default()
        };
        let map = parse("requests --hash=sha256:aaa\n", &options)?;
        assert_eq!(map.len(), 1);

        let err = parse("requests --hash=sha256:aaa\nflask\n", &options).unwrap_err();
        assert!(matches!(err, Error::MissingHashes { lineno: 2, .. }), "{err}");
        Ok(())
    }

    #[test]
    fn url_requirement_with_egg_fragment() -> Result<()> {
        let map = parse(
            "https://example.com/pip-1.3.1.tar.gz#egg=pip\n",
            &ParseOptions::default(),
        )?;
        let pip = valid(&map["pip"]);
        assert!(matches!(
            pip.pep508.version_or_url,
            Some(VersionOrUrl::Url(_))
        ));
        Ok(())
    }

    #[test]
    fn url_requirement_keeps_its_marker() -> Result<()> {
        let map = parse(
            "git+https://github.com/pypa/pip#egg=pip ; python_version > \"3.6\"\n",
            &ParseOptions::default(),
        )?;
        let pip = valid(&map["pip"]);
        assert!(matches!(
            pip.pep508.version_or_url,
            Some(VersionOrUrl::Url(ref url)) if url.as_str() == "https://github.com/pypa/pip#egg=pip"
        ));
        assert!(pip.pep508.marker.is_some());
        assert!(pip.pep508.evaluate_markers(&env37(), &[]));
        Ok(())
    }

    #[test]
    fn url_wheel_rewrites_to_pinned_version() -> Result<()> {
        let map = parse(
            "https://example.com/pip-1.3.1-py2.py3-none-any.whl\n",
            &ParseOptions::default(),
        )?;
        let pip = valid(&map["pip"]);
        let Some(VersionOrUrl::VersionSpecifier(specifiers)) = &pip.pep508.version_or_url else {
            panic!("expected a pinned version");
        };
        assert_eq!(specifiers.to_string(), "==1.3.1");
        assert!(specifiers.contains(&pipq_pep440::Version::from_str("1.3.1")?));
        Ok(())
    }

    #[test]
    fn local_wheel_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_file(dir.path(), "pip-1.3.1-py2.py3-none-any.whl", "");
        let root = write_file(
            dir.path(),
            "requirements.txt",
            "./pip-1.3.1-py2.py3-none-any.whl\n",
        );
        let map = parse_requirements(root, &ParseOptions::default())?;
        let pip = valid(&map["pip"]);
        let Some(VersionOrUrl::VersionSpecifier(specifiers)) = &pip.pep508.version_or_url else {
            panic!("expected a pinned version");
        };
        assert_eq!(specifiers.to_string(), "==1.3.1");
        Ok(())
    }

    #[test]
    fn local_archive_requires_egg_fragment() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_file(dir.path(), "pip-1.3.1.tar.gz", "");
        let root = write_file(dir.path(), "requirements.txt", "./pip-1.3.1.tar.gz\n");
        let err = parse_requirements(root, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingEggFragment { .. }), "{err}");
        Ok(())
    }

    #[test]
    fn local_directory_must_be_installable() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("project"))?;
        let root = write_file(dir.path(), "requirements.txt", "./project\n");
        let err = parse_requirements(root, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidLocalProject { .. }), "{err}");
        Ok(())
    }

    #[test]
    fn editable_local_project() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_file(
            dir.path(),
            "pyproject.toml",
            indoc! {r#"
                [project]
                name = "pip-api"
            "#},
        );
        let root = write_file(dir.path(), "requirements.txt", "-e .\n");
        let map = parse_requirements(root, &ParseOptions::default())?;
        let pip_api = valid(&map["pip-api"]);
        assert!(pip_api.editable);
        assert!(matches!(
            pip_api.pep508.version_or_url,
            Some(VersionOrUrl::Url(ref url)) if url.scheme() == "file"
        ));
        Ok(())
    }

    #[test]
    fn false_marker_drops_requirement() -> Result<()> {
        let options = ParseOptions {
            marker_env: Some(env37()),
            ..ParseOptions::default()
        };
        let map = parse(
            indoc! {r#"
                requests >= 2.8.1 ; python_version > "3.0"
                requests == 2.0.0 ; python_version < "3.0"
            "#},
            &options,
        )?;
        assert_eq!(map.len(), 1);
        let requests = valid(&map["requests"]);
        assert_eq!(requests.lineno, 1);
        Ok(())
    }

    #[test]
    fn conflicting_markers_without_env_are_a_duplicate() {
        let err = parse(
            indoc! {r#"
                requests >= 2.8.1 ; python_version > "3.0"
                requests == 2.0.0 ; python_version < "3.0"
            "#},
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateRequirement { .. }), "{err}");
    }

    #[test]
    fn invalid_line_fails_the_parse() {
        let err = parse("requests >= 2.8.1 garbage\n", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedSpecifier { lineno: 1, .. }), "{err}");
    }

    #[test]
    fn invalid_line_is_kept_in_permissive_mode() -> Result<()> {
        let options = ParseOptions {
            include_invalid: true,
            ..ParseOptions::default()
        };
        let map = parse("requests >= 2.8.1 garbage\nflask\n", &options)?;
        assert_eq!(map.len(), 2);
        let ParsedRequirement::Invalid(unparsed) = &map["requests >= 2.8.1 garbage"] else {
            panic!("expected an unparsed requirement");
        };
        assert!(!unparsed.message.is_empty());
        assert_eq!(unparsed.lineno, 1);
        assert!(matches!(&map["flask"], ParsedRequirement::Valid(_)));
        Ok(())
    }

    #[test]
    fn single_equal_gets_a_hint() {
        let err = parse("pipq=1.0\n", &ParseOptions::default()).unwrap_err();
        assert!(err.to_string().contains("=="), "{err}");
    }

    #[test]
    fn skip_regex_drops_matching_lines() -> Result<()> {
        let options = ParseOptions {
            skip_regex: Some(Regex::new("^internal-").unwrap()),
            ..ParseOptions::default()
        };
        let map = parse("requests\ninternal-package==1.0\n", &options)?;
        assert_eq!(map.keys().collect::<Vec<_>>(), ["requests"]);
        Ok(())
    }

    #[test]
    fn index_options_produce_no_entries() -> Result<()> {
        let map = parse(
            indoc! {"
                --index-url https://example.com/simple
                --extra-index-url https://mirror.example.com/simple
                -f ./links
                --trusted-host example.com
                requests
            "},
            &ParseOptions::default(),
        )?;
        assert_eq!(map.keys().collect::<Vec<_>>(), ["requests"]);
        Ok(())
    }

    #[test]
    fn continuation_lines_number_from_first_physical_line() -> Result<()> {
        let map = parse(
            "requests \\\n    >= 2.8.1\nflask\n",
            &ParseOptions::default(),
        )?;
        assert_eq!(valid(&map["requests"]).lineno, 1);
        assert_eq!(valid(&map["flask"]).lineno, 3);
        Ok(())
    }
}
