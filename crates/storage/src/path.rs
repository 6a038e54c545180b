//! Storage path validation.
//!
//! Every path handed to a backend is relative to that backend's root. Record
//! paths come from HTTP request bodies, so they are treated as hostile until
//! they pass through [`validate`].

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Suffix appended to in-flight writes before they are renamed into place.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Validates and normalizes a storage path.
///
/// `.` components, repeated separators and trailing slashes are dropped, and
/// `..` is resolved lexically. Fails with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath) if the path would
/// leave the storage root, resolves to nothing, carries a drive prefix, or
/// contains a NUL byte.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use golink_storage::validate_path;
///
/// assert!(validate_path("docs/report.pdf").is_ok());
/// assert!(validate_path("a/../data.csv").is_ok()); // (never leaves storage root)
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err()); // (leaves storage root)
/// assert_eq!(
///     validate_path("wrong/../still-wrong/.././correct//./report.pdf/").unwrap(),
///     Path::new("correct/report.pdf")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut resolved: Vec<&std::ffi::OsStr> = Vec::new();
    for component in original.components() {
        match component {
            // NUL survives Path::components() on Unix but truncates in syscalls.
            Component::Normal(part) if part.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(part) => resolved.push(part),
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir if resolved.pop().is_some() => {},
            Component::ParentDir | Component::Prefix(_) => exn::bail!(invalid()),
        }
    }
    if resolved.is_empty() {
        exn::bail!(invalid());
    }
    Ok(resolved.into_iter().collect())
}

/// Path that content is streamed into before being renamed to `path`.
pub fn partial(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("docs/report.pdf", "docs/report.pdf")]
    #[case("genomes/hg38/chr1.fa.gz", "genomes/hg38/chr1.fa.gz")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("a/b/..", "a")]
    #[case("/docs/report.pdf", "docs/report.pdf")]
    #[case("docs///", "docs")]
    #[case("report.pdf/", "report.pdf")]
    fn test_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("../..")]
    #[case("a\0b")]
    #[case("\0")]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    fn test_rejects(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_partial_path_is_a_sibling() {
        let partial = partial(Path::new("docs/report.pdf"));
        assert_eq!(partial, Path::new("docs/report.pdf.partial"));
        assert_eq!(partial.parent(), Some(Path::new("docs")));
    }
}
