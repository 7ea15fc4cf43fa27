//! Resolves `-e`/`--editable` references to a package name and an installable URL.

use std::path::Path;

use fs_err as fs;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::link::{egg_fragment, path_to_url, strip_extras, url_to_path};
use crate::Error;

/// A literal `name="..."` keyword argument of a `setup(...)` call.
static SETUP_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name\s*=\s*["']([^"']+)["']"#).unwrap());

/// The subset of pyproject.toml we read the project name from.
#[derive(Deserialize)]
struct PyProjectToml {
    project: Option<Project>,
}

#[derive(Deserialize)]
struct Project {
    name: Option<String>,
}

/// Determines the package name of a local project directory.
///
/// The `project.name` in pyproject.toml wins; otherwise the name is recovered
/// from a literal `name=` argument in setup.py.
fn local_package_name(path: &Path) -> Result<String, Error> {
    let pyproject_toml = path.join("pyproject.toml");
    let setup_py = path.join("setup.py");
    if !pyproject_toml.is_file() && !setup_py.is_file() {
        return Err(Error::NotInstallable {
            given: path.display().to_string(),
            reason: "neither 'setup.py' nor 'pyproject.toml' found".to_string(),
        });
    }

    if pyproject_toml.is_file() {
        let content = fs::read_to_string(&pyproject_toml)?;
        if let Ok(pyproject) = toml::from_str::<PyProjectToml>(&content) {
            if let Some(name) = pyproject.project.and_then(|project| project.name) {
                return Ok(name);
            }
        }
    }

    if setup_py.is_file() {
        let content = fs::read_to_string(&setup_py)?;
        if let Some(captures) = SETUP_NAME_RE.captures(&content) {
            if let Some(name) = captures.get(1) {
                return Ok(name.as_str().to_string());
            }
        }
    }

    Err(Error::NotInstallable {
        given: path.display().to_string(),
        reason: "could not parse package name from 'setup.py'".to_string(),
    })
}

/// Resolves an editable reference to `(name, url)`.
///
/// Local directories and `file:` URLs must name an installable project; anything
/// else must be a VCS URL carrying an `egg=` name. Relative paths resolve against
/// the directory of the requirements file that declared them.
pub(crate) fn parse_editable(given: &str, working_dir: &Path) -> Result<(String, String), Error> {
    let (no_extras, _) = strip_extras(given);

    let path = working_dir.join(no_extras);
    if path.is_dir() {
        let url = path_to_url(&path, working_dir)?;
        return Ok((local_package_name(&path)?, url.to_string()));
    }

    if no_extras.to_lowercase().starts_with("file:") {
        let url = url::Url::parse(no_extras).map_err(|source| Error::Url {
            url: no_extras.to_string(),
            source,
        })?;
        let path = url_to_path(&url)?;
        return Ok((local_package_name(&path)?, url.to_string()));
    }

    if !given.contains('+') {
        return Err(Error::NotInstallable {
            given: given.to_string(),
            reason: "expected a path to a local project or a VCS url beginning with svn+, \
                     git+, hg+, or bzr+"
                .to_string(),
        });
    }

    let name = egg_fragment(given).ok_or_else(|| Error::MissingEggFragment {
        url: given.to_string(),
    })?;
    Ok((name.to_string(), given.to_string()))
}
