/// Extensions of the archive formats pip knows how to install from.
///
/// Multi-part tar extensions come first so that longest-match wins when
/// splitting a filename.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.bz2",
    ".tar.gz",
    ".tar.lz",
    ".tar.lzma",
    ".tar.xz",
    ".tar",
    ".tbz",
    ".tgz",
    ".tlz",
    ".txz",
    ".whl",
    ".zip",
];

/// Splits a filename into stem and extension, treating `.tar.*` as a single
/// extension.
///
/// Archive extensions match case-insensitively and come back in their
/// lowercase form.
pub fn split_extension(filename: &str) -> (&str, &str) {
    for &extension in ARCHIVE_EXTENSIONS {
        let Some(split) = filename.len().checked_sub(extension.len()) else {
            continue;
        };
        let suffix_matches = filename
            .get(split..)
            .is_some_and(|suffix| suffix.eq_ignore_ascii_case(extension));
        if suffix_matches {
            return (&filename[..split], extension);
        }
    }
    // Fall back to splitting on the last dot, if any. A leading dot
    // (a hidden file) is part of the stem.
    match filename.rfind('.') {
        Some(index) if index > 0 => filename.split_at(index),
        _ => (filename, ""),
    }
}

/// Whether the filename looks like an installable archive (wheel, sdist or zip).
pub fn is_archive_file(filename: &str) -> bool {
    let (_, extension) = split_extension(filename);
    ARCHIVE_EXTENSIONS.contains(&extension)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{is_archive_file, split_extension};

    #[test_case("pip-1.3.1.tar.gz", ("pip-1.3.1", ".tar.gz"))]
    #[test_case("pip-1.3.1-py2.py3-none-any.whl", ("pip-1.3.1-py2.py3-none-any", ".whl"))]
    #[test_case("archive.tar", ("archive", ".tar"))]
    #[test_case("archive.tbz", ("archive", ".tbz"))]
    #[test_case("PIP-1.0.TAR.GZ", ("PIP-1.0", ".tar.gz"))]
    #[test_case("setup.py", ("setup", ".py"))]
    #[test_case("README", ("README", ""))]
    #[test_case(".hidden", (".hidden", ""))]
    fn split(filename: &str, expected: (&str, &str)) {
        assert_eq!(split_extension(filename), expected);
    }

    #[test_case("pip-1.3.1-py2.py3-none-any.whl", true)]
    #[test_case("pip-1.3.1.zip", true)]
    #[test_case("pip-1.3.1.tar.lzma", true)]
    #[test_case("PIP-1.0.TAR.GZ", true)]
    #[test_case("Pip-1.3.1-py2.py3-none-any.WHL", true; "uppercase whl")]
    #[test_case("pip-1.3.1.tar.zst", false)]
    #[test_case("requirements.txt", false)]
    fn archive(filename: &str, expected: bool) {
        assert_eq!(is_archive_file(filename), expected);
    }
}
