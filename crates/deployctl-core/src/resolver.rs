//! Latest-artifact resolution by semantic version
//!
//! Candidates without the version provide are ignored. Candidates whose version does
//! not parse are reported to a [`DiagnosticSink`] and skipped. The remaining
//! candidates are ranked by semantic-version precedence; build metadata does not
//! take part in the ranking.

use std::cmp::Ordering;
use std::fmt;

use semver::Version;
use tracing::{debug, warn};

use deployctl_api::responses::ArtifactDescriptor;

use crate::config::COMMS_VERSION_KEY;
use crate::error::CoreError;

/// A version string in canonical `vMAJOR.MINOR.PATCH[-PRE][+BUILD]` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag {
    raw: String,
    canonical: String,
    version: Version,
}

impl VersionTag {
    /// Normalize and validate a provide value
    ///
    /// # Errors
    /// Returns the parser error when the normalized string is not a valid
    /// semantic version.
    pub fn parse(raw: &str) -> Result<Self, semver::Error> {
        let canonical = normalize(raw);
        let version = Version::parse(&canonical[1..])?;
        Ok(Self {
            raw: raw.to_string(),
            canonical,
            version,
        })
    }

    /// Value exactly as the artifact provides it
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Precedence order; build metadata is ignored
    #[must_use]
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.version.cmp_precedence(&other.version)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Prefix a version string with `v` unless it already has one
pub fn normalize(raw: &str) -> String {
    if raw.starts_with('v') {
        raw.to_string()
    } else {
        format!("v{raw}")
    }
}

/// A candidate excluded because its version could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub artifact: String,
    pub version: String,
    pub reason: String,
}

/// Receives candidates excluded during resolution
pub trait DiagnosticSink {
    fn skipped(&self, candidate: &SkippedCandidate);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&SkippedCandidate),
{
    fn skipped(&self, candidate: &SkippedCandidate) {
        self(candidate);
    }
}

/// Sink emitting a warning through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn skipped(&self, candidate: &SkippedCandidate) {
        warn!(
            artifact = %candidate.artifact,
            version = %candidate.version,
            reason = %candidate.reason,
            "not a valid semver version, skipping"
        );
    }
}

/// The selected artifact and its parsed version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub artifact: &'a ArtifactDescriptor,
    pub version: VersionTag,
}

impl Resolution<'_> {
    pub fn artifact_name(&self) -> &str {
        &self.artifact.name
    }
}

/// Picks the artifact with the highest version under a provide key
#[derive(Debug, Clone)]
pub struct VersionResolver<S = TracingSink> {
    version_key: String,
    sink: S,
}

impl VersionResolver<TracingSink> {
    /// Resolver over the comms version key, warning through `tracing`
    #[must_use]
    pub fn new() -> Self {
        Self::with_key(COMMS_VERSION_KEY)
    }

    pub fn with_key(version_key: impl Into<String>) -> Self {
        Self {
            version_key: version_key.into(),
            sink: TracingSink,
        }
    }
}

impl Default for VersionResolver<TracingSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DiagnosticSink> VersionResolver<S> {
    /// Replace the diagnostic sink
    pub fn with_sink<T: DiagnosticSink>(self, sink: T) -> VersionResolver<T> {
        VersionResolver {
            version_key: self.version_key,
            sink,
        }
    }

    pub fn version_key(&self) -> &str {
        &self.version_key
    }

    /// Select the candidate with the highest valid version
    ///
    /// Equal versions keep the candidate that comes first in `candidates`.
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` when no candidate carries a valid version.
    pub fn resolve_latest<'a>(
        &self,
        candidates: &'a [ArtifactDescriptor],
    ) -> Result<Resolution<'a>, CoreError> {
        let mut best: Option<Resolution<'a>> = None;

        for artifact in candidates {
            let Some(raw) = artifact.provide(&self.version_key) else {
                continue;
            };

            let version = match VersionTag::parse(raw) {
                Ok(version) => version,
                Err(e) => {
                    self.sink.skipped(&SkippedCandidate {
                        artifact: artifact.name.clone(),
                        version: normalize(raw),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let replace = best
                .as_ref()
                .is_none_or(|current| version.precedence(&current.version) == Ordering::Greater);
            if replace {
                best = Some(Resolution { artifact, version });
            }
        }

        let resolution =
            best.ok_or_else(|| CoreError::NotFound("no versioned artifacts found".to_string()))?;

        debug!(
            artifact = %resolution.artifact.name,
            version = %resolution.version,
            "resolved latest artifact"
        );

        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn artifact(name: &str, version: &str) -> ArtifactDescriptor {
        ArtifactDescriptor::new(name).with_provide(COMMS_VERSION_KEY, version)
    }

    #[test]
    fn test_numeric_not_lexical_ordering() {
        let skipped = RefCell::new(Vec::new());
        let resolver = VersionResolver::new()
            .with_sink(|c: &SkippedCandidate| skipped.borrow_mut().push(c.clone()));

        let candidates = vec![
            artifact("a", "1.2.0"),
            artifact("b", "1.10.0"),
            artifact("c", "not-a-version"),
        ];
        let resolution = resolver.resolve_latest(&candidates).unwrap();

        assert_eq!(resolution.artifact_name(), "b");
        assert_eq!(resolution.version.canonical(), "v1.10.0");
        assert_eq!(resolution.version.raw(), "1.10.0");

        let skipped = skipped.borrow();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].artifact, "c");
        assert_eq!(skipped[0].version, "vnot-a-version");
    }

    #[test]
    fn test_missing_key_is_silent() {
        let skipped = RefCell::new(0);
        let resolver = VersionResolver::new().with_sink(|_: &SkippedCandidate| {
            *skipped.borrow_mut() += 1;
        });

        let candidates = vec![
            ArtifactDescriptor::new("rootfs").with_provide("rootfs-image.version", "3.0.0"),
            artifact("comms", "0.9.1"),
        ];
        let resolution = resolver.resolve_latest(&candidates).unwrap();

        assert_eq!(resolution.artifact_name(), "comms");
        assert_eq!(*skipped.borrow(), 0);
    }

    #[test]
    fn test_no_valid_candidates() {
        let resolver = VersionResolver::new().with_sink(|_: &SkippedCandidate| {});

        let candidates = vec![
            ArtifactDescriptor::new("rootfs"),
            artifact("broken", "1.2"),
            artifact("worse", "latest"),
        ];
        let err = resolver.resolve_latest(&candidates).unwrap_err();
        assert_eq!(
            err,
            CoreError::NotFound("no versioned artifacts found".to_string())
        );

        assert!(resolver.resolve_latest(&[]).is_err());
    }

    #[test]
    fn test_prerelease_ranks_below_release() {
        let resolver = VersionResolver::new();
        let candidates = vec![
            artifact("rc", "v2.0.0-rc.1"),
            artifact("release", "2.0.0"),
            artifact("old", "1.99.99"),
        ];

        let resolution = resolver.resolve_latest(&candidates).unwrap();
        assert_eq!(resolution.artifact_name(), "release");
    }

    #[test]
    fn test_prerelease_identifiers() {
        let resolver = VersionResolver::new();
        let candidates = vec![
            artifact("alpha", "1.0.0-alpha"),
            artifact("alpha.1", "1.0.0-alpha.1"),
            artifact("beta.2", "1.0.0-beta.2"),
            artifact("beta.11", "1.0.0-beta.11"),
        ];

        let resolution = resolver.resolve_latest(&candidates).unwrap();
        assert_eq!(resolution.artifact_name(), "beta.11");
    }

    #[test]
    fn test_build_metadata_ties_keep_first() {
        let resolver = VersionResolver::new();
        let candidates = vec![
            artifact("first", "1.4.0+build.9"),
            artifact("second", "1.4.0+build.10"),
            artifact("third", "v1.4.0"),
        ];

        let resolution = resolver.resolve_latest(&candidates).unwrap();
        assert_eq!(resolution.artifact_name(), "first");

        let reversed: Vec<_> = candidates.into_iter().rev().collect();
        let resolution = resolver.resolve_latest(&reversed).unwrap();
        assert_eq!(resolution.artifact_name(), "third");
    }

    #[test]
    fn test_custom_version_key() {
        let resolver = VersionResolver::with_key("rootfs-image.version");
        let candidates = vec![
            ArtifactDescriptor::new("r1").with_provide("rootfs-image.version", "1.0.0"),
            ArtifactDescriptor::new("r2").with_provide("rootfs-image.version", "1.0.1"),
            artifact("comms", "9.9.9"),
        ];

        let resolution = resolver.resolve_latest(&candidates).unwrap();
        assert_eq!(resolver.version_key(), "rootfs-image.version");
        assert_eq!(resolution.artifact_name(), "r2");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["1.2.3", "v1.2.3", "1.0.0-rc.1+sha.5", "garbage", ""] {
            let once = normalize(raw);
            assert!(once.starts_with('v'));
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_precedence_is_consistent() {
        let versions: Vec<VersionTag> = [
            "0.1.0",
            "1.0.0-alpha",
            "1.0.0",
            "1.0.1",
            "1.10.0",
            "2.0.0",
        ]
        .iter()
        .map(|v| VersionTag::parse(v).unwrap())
        .collect();

        for (i, a) in versions.iter().enumerate() {
            for (j, b) in versions.iter().enumerate() {
                let ord = a.precedence(b);
                assert_eq!(ord, i.cmp(&j), "{a} vs {b}");
                assert_eq!(b.precedence(a), ord.reverse());
            }
        }
    }

    #[test]
    fn test_version_tag_rejects_partial_versions() {
        assert!(VersionTag::parse("1").is_err());
        assert!(VersionTag::parse("1.2").is_err());
        assert!(VersionTag::parse("01.2.3").is_err());
        assert!(VersionTag::parse("V1.2.3").is_err());

        let tag = VersionTag::parse("v3.1.4-beta+exp.sha.5114f85").unwrap();
        assert_eq!(tag.canonical(), "v3.1.4-beta+exp.sha.5114f85");
        assert_eq!(tag.version().major, 3);
    }
}
