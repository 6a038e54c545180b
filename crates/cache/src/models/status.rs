use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a file record.
///
/// ```text
/// publish:  starting ─▶ hashing ─▶ available | failed
/// pull:     pullable ─▶ pulling ─▶ hashing ─▶ available | failed
/// reconcile: failed ─▶ pullable | unavailable
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Registered; content is being copied into local storage.
    Starting,
    /// Content is local and its digest is being computed.
    Hashing,
    /// Content exists at a pullable origin but not locally.
    Pullable,
    /// Content is being fetched from its origin.
    Pulling,
    /// Content is local and verified.
    Available,
    /// Content is neither local nor retrievable.
    Unavailable,
    /// The last publish or pull failed.
    Failed,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Self::Starting,
        Self::Hashing,
        Self::Pullable,
        Self::Pulling,
        Self::Available,
        Self::Unavailable,
        Self::Failed,
    ];

    /// States owned by exactly one running operation.
    pub const IN_PROGRESS: [Status; 3] = [Self::Starting, Self::Pulling, Self::Hashing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Hashing => "hashing",
            Self::Pullable => "pullable",
            Self::Pulling => "pulling",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
        }
    }

    pub fn is_in_progress(&self) -> bool {
        Self::IN_PROGRESS.contains(self)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::ALL.into_iter().find(|status| status.as_str() == s) {
            Some(status) => Ok(status),
            None => exn::bail!(ErrorKind::InvalidData("status")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("starting", Status::Starting)]
    #[case("hashing", Status::Hashing)]
    #[case("pullable", Status::Pullable)]
    #[case("pulling", Status::Pulling)]
    #[case("available", Status::Available)]
    #[case("unavailable", Status::Unavailable)]
    #[case("failed", Status::Failed)]
    fn test_parse(#[case] input: &str, #[case] expected: Status) {
        assert_eq!(input.parse::<Status>().unwrap(), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[rstest]
    #[case("Available")]
    #[case("unpublished")]
    #[case("")]
    fn test_parse_unknown(#[case] input: &str) {
        assert!(input.parse::<Status>().is_err());
    }

    #[test]
    fn test_in_progress() {
        let in_progress: Vec<_> = Status::ALL.into_iter().filter(Status::is_in_progress).collect();
        assert_eq!(in_progress, vec![Status::Starting, Status::Hashing, Status::Pulling]);
    }
}
