use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;

use pipq_normalize::PackageName;
use pipq_pep440::Version;

use crate::{call, ensure_pip_version, version, Error};

/// An installed distribution as reported by `pip list`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Distribution {
    pub name: PackageName,
    pub version: Version,
    pub location: Option<PathBuf>,
    pub editable_project_location: Option<PathBuf>,
    pub editable: bool,
}

/// One entry of `pip list --format=json`.
#[derive(Deserialize)]
struct DistributionEntry {
    name: String,
    version: String,
    location: Option<PathBuf>,
    editable_project_location: Option<PathBuf>,
}

/// Lists the installed distributions by normalized name, in pip's order.
///
/// `local` restricts the listing to the current virtualenv (`-l`), `paths`
/// lists other site directories instead (`--path`, pip 19.2 or later).
pub fn installed_distributions(
    local: bool,
    paths: &[impl AsRef<Path>],
) -> Result<IndexMap<PackageName, Distribution>, Error> {
    let mut args = vec!["list", "-v", "--format=json"];
    if local {
        args.push("-l");
    }
    if !paths.is_empty() {
        ensure_pip_version("--path", Version::new([19, 2]))?;
    }
    let paths: Vec<String> = paths
        .iter()
        .map(|path| path.as_ref().to_string_lossy().into_owned())
        .collect();
    for path in &paths {
        args.push("--path");
        args.push(path);
    }
    let output = call(&args)?;
    distributions_from_json(&output, &version()?)
}

/// pip 21.3 moved editables out of `location` into `editable_project_location`.
fn distributions_from_json(
    json: &str,
    pip_version: &Version,
) -> Result<IndexMap<PackageName, Distribution>, Error> {
    let entries: Vec<DistributionEntry> = serde_json::from_str(json)?;
    let reports_editable_location = *pip_version >= Version::new([21, 3]);
    let mut distributions = IndexMap::with_capacity(entries.len());
    for entry in entries {
        let name = PackageName::from_str(&entry.name)?;
        let editable = if reports_editable_location {
            entry.editable_project_location.is_some()
        } else {
            entry.location.is_some()
        };
        distributions.insert(
            name.clone(),
            Distribution {
                name,
                version: Version::from_str(&entry.version)?,
                location: entry.location,
                editable_project_location: entry.editable_project_location,
                editable,
            },
        );
    }
    Ok(distributions)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use indoc::indoc;

    use pipq_normalize::PackageName;
    use pipq_pep440::Version;

    use super::distributions_from_json;

    fn name(name: &str) -> PackageName {
        PackageName::from_str(name).unwrap()
    }

    #[test]
    fn modern_listing() {
        let json = indoc! {r#"
            [
                {"name": "pip", "version": "23.3.2", "location": null, "editable_project_location": null},
                {"name": "pip-api", "version": "0.0.30", "location": "/src/pip-api", "editable_project_location": "/src/pip-api"}
            ]
        "#};
        let distributions =
            distributions_from_json(json, &Version::from_str("23.3.2").unwrap()).unwrap();
        assert_eq!(distributions.len(), 2);
        assert!(!distributions[&name("pip")].editable);
        let pip_api = &distributions[&name("pip-api")];
        assert!(pip_api.editable);
        assert_eq!(pip_api.version.to_string(), "0.0.30");
    }

    #[test]
    fn legacy_editable_derives_from_location() {
        let json = r#"[{"name": "pip-api", "version": "0.0.30", "location": "/src/pip-api"}]"#;
        let distributions =
            distributions_from_json(json, &Version::from_str("20.0").unwrap()).unwrap();
        assert!(distributions[&name("pip-api")].editable);
    }
}
