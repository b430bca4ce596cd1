use agentup_platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote description of the latest build.
///
/// Decoding is strict: unknown fields make the document invalid. Absent
/// fields fall back to empty values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub product: String,
    pub channel: String,
    pub version: String,
    pub published_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub artifacts: Vec<Artifact>,
}

/// One downloadable build for an OS/architecture pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Artifact {
    pub os: String,
    pub arch: String,
    pub name: String,
    pub url: String,
    pub sha256: String,
}

impl Manifest {
    /// Decode a manifest document.
    ///
    /// # Errors
    /// Returns the decoder error for malformed JSON or unknown fields.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// First artifact built for `platform`; duplicates after it are ignored.
    #[must_use]
    pub fn select_artifact(&self, platform: &Platform) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|artifact| platform.matches(&artifact.os, &artifact.arch))
    }
}

#[cfg(test)]
mod tests {
    use agentup_platform::{Arch, Os, Platform};

    use super::{Artifact, Manifest};

    fn artifact(os: &str, arch: &str, name: &str) -> Artifact {
        Artifact {
            os: os.to_string(),
            arch: arch.to_string(),
            name: name.to_string(),
            url: format!("https://updates.example.com/{name}"),
            sha256: "ab".repeat(32),
        }
    }

    #[test]
    fn decodes_full_document() {
        let json = br#"{
            "product": "agent",
            "channel": "stable",
            "version": "2.0.0",
            "published_at": "2026-03-01T12:00:00Z",
            "notes": "Bug fixes",
            "artifacts": [
                {"os": "linux", "arch": "amd64", "name": "agent", "url": "https://x/agent", "sha256": "abc"}
            ]
        }"#;

        let manifest = Manifest::from_slice(json).expect("manifest should decode");

        assert_eq!(manifest.version, "2.0.0");
        assert_eq!(manifest.channel, "stable");
        assert_eq!(
            manifest.published_at.map(|at| at.to_rfc3339()),
            Some("2026-03-01T12:00:00+00:00".to_string())
        );
        assert_eq!(manifest.artifacts.len(), 1);
        assert_eq!(manifest.artifacts[0].sha256, "abc");
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let json = br#"{"version": "1.0.0", "artifacts": [], "signature": "x"}"#;

        let error = Manifest::from_slice(json).expect_err("unknown field should be rejected");

        assert!(error.to_string().contains("signature"));
    }

    #[test]
    fn rejects_unknown_artifact_field() {
        let json = br#"{"version": "1.0.0", "artifacts": [{"os": "linux", "size": 10}]}"#;

        assert!(Manifest::from_slice(json).is_err());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let manifest =
            Manifest::from_slice(br#"{"version": "1.0.0", "artifacts": [{"os": "linux"}]}"#)
                .expect("partial manifest should decode");

        assert!(manifest.product.is_empty());
        assert!(manifest.published_at.is_none());
        assert!(manifest.artifacts[0].sha256.is_empty());
    }

    #[test]
    fn selects_first_match_case_insensitively() {
        let manifest = Manifest {
            artifacts: vec![
                artifact("windows", "amd64", "agent.exe"),
                artifact("Linux", "AMD64", "agent-first"),
                artifact("linux", "amd64", "agent-second"),
            ],
            ..Manifest::default()
        };

        let selected = manifest
            .select_artifact(&Platform::new(Os::Linux, Arch::Amd64))
            .expect("linux/amd64 should match");

        assert_eq!(selected.name, "agent-first");
    }

    #[test]
    fn select_returns_none_without_match() {
        let manifest = Manifest {
            artifacts: vec![
                artifact("linux", "amd64", "agent"),
                artifact("windows", "amd64", "agent.exe"),
            ],
            ..Manifest::default()
        };

        assert!(
            manifest
                .select_artifact(&Platform::new(Os::Darwin, Arch::Arm64))
                .is_none()
        );
    }
}
