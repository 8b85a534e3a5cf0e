// crates/microcks-harness-core/src/artifact.rs
// ============================================================================
// Module: Microcks Harness Artifacts
// Description: Artifact references pushed into the backend at startup.
// Purpose: Validate artifact sources early and fix their consumption order.
// Dependencies: url, thiserror
// ============================================================================

//! ## Overview
//! An [`ArtifactRef`] names one contract, collection, or snapshot the backend
//! must ingest. References are validated when they are created, so a missing
//! file fails the configuration step before any network activity.
//! Invariants:
//! - Local sources exist at construction time.
//! - [`ArtifactSet::ordered`] yields main files, then secondary files, then
//!   remote URLs, then snapshots, each group in insertion order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact validation failures raised at configuration time.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    /// Locator was empty.
    #[error("{0} artifact locator must be non-empty")]
    EmptyLocator(ArtifactCategory),
    /// Local source does not exist or is not a file.
    #[error("{category} artifact file not found: {path}")]
    NotFound {
        /// Category of the rejected artifact.
        category: ArtifactCategory,
        /// Path that failed the existence check.
        path: PathBuf,
    },
    /// Remote URL failed to parse or uses an unsupported scheme.
    #[error("invalid remote artifact url {url}: {reason}")]
    InvalidUrl {
        /// Rejected URL text.
        url: String,
        /// Parse or scheme failure description.
        reason: String,
    },
}

// ============================================================================
// SECTION: Categories
// ============================================================================

/// Synchronization category of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCategory {
    /// Primary service-defining file.
    MainFile,
    /// Supplementary file such as a request collection.
    SecondaryFile,
    /// Artifact fetched by the backend from a URL.
    RemoteUrl,
    /// Bulk repository export imported wholesale.
    SnapshotFile,
}

impl ArtifactCategory {
    /// Categories in synchronization order.
    pub const ORDER: [Self; 4] = [Self::MainFile, Self::SecondaryFile, Self::RemoteUrl, Self::SnapshotFile];

    /// Returns a stable label for the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MainFile => "main",
            Self::SecondaryFile => "secondary",
            Self::RemoteUrl => "remote",
            Self::SnapshotFile => "snapshot",
        }
    }
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Artifact References
// ============================================================================

/// One artifact to push into the backend.
///
/// # Invariants
/// - File variants point at a file that existed when the reference was built.
/// - Remote variants hold an absolute http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRef {
    /// Primary contract file uploaded with `mainArtifact=true`.
    MainFile {
        /// Local file path.
        path: PathBuf,
    },
    /// Supplementary file uploaded with `mainArtifact=false`.
    SecondaryFile {
        /// Local file path.
        path: PathBuf,
    },
    /// Artifact the backend downloads itself.
    RemoteUrl {
        /// Remote artifact URL.
        url: Url,
        /// Whether the artifact is imported as a main artifact.
        main: bool,
    },
    /// Repository snapshot imported through the import endpoint.
    SnapshotFile {
        /// Local file path.
        path: PathBuf,
    },
}

impl ArtifactRef {
    /// Creates a main artifact reference.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when the path is empty or missing.
    pub fn main_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = existing_file(ArtifactCategory::MainFile, path.as_ref())?;
        Ok(Self::MainFile {
            path,
        })
    }

    /// Creates a secondary artifact reference.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when the path is empty or missing.
    pub fn secondary_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = existing_file(ArtifactCategory::SecondaryFile, path.as_ref())?;
        Ok(Self::SecondaryFile {
            path,
        })
    }

    /// Creates a snapshot reference.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when the path is empty or missing.
    pub fn snapshot_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = existing_file(ArtifactCategory::SnapshotFile, path.as_ref())?;
        Ok(Self::SnapshotFile {
            path,
        })
    }

    /// Creates a remote artifact reference.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when the URL is empty, malformed, or not http(s).
    pub fn remote_url(url: &str, main: bool) -> Result<Self, ArtifactError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(ArtifactError::EmptyLocator(ArtifactCategory::RemoteUrl));
        }
        let parsed = Url::parse(trimmed).map_err(|err| ArtifactError::InvalidUrl {
            url: trimmed.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ArtifactError::InvalidUrl {
                url: trimmed.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        Ok(Self::RemoteUrl {
            url: parsed,
            main,
        })
    }

    /// Returns the synchronization category.
    #[must_use]
    pub const fn category(&self) -> ArtifactCategory {
        match self {
            Self::MainFile {
                ..
            } => ArtifactCategory::MainFile,
            Self::SecondaryFile {
                ..
            } => ArtifactCategory::SecondaryFile,
            Self::RemoteUrl {
                ..
            } => ArtifactCategory::RemoteUrl,
            Self::SnapshotFile {
                ..
            } => ArtifactCategory::SnapshotFile,
        }
    }

    /// Returns a short label for logs: the file name or the URL.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::MainFile {
                path,
            }
            | Self::SecondaryFile {
                path,
            }
            | Self::SnapshotFile {
                path,
            } => file_name(path),
            Self::RemoteUrl {
                url, ..
            } => url.to_string(),
        }
    }
}

/// Returns the final path component as a display string.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// Validates that a local artifact source exists and is a file.
fn existing_file(category: ArtifactCategory, path: &Path) -> Result<PathBuf, ArtifactError> {
    if path.as_os_str().is_empty() {
        return Err(ArtifactError::EmptyLocator(category));
    }
    if !path.is_file() {
        return Err(ArtifactError::NotFound {
            category,
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}

// ============================================================================
// SECTION: Artifact Set
// ============================================================================

/// Configured artifacts for one backend.
///
/// # Invariants
/// - Insertion order is preserved within each category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    /// Artifacts in insertion order.
    entries: Vec<ArtifactRef>,
}

impl ArtifactSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an artifact.
    pub fn push(&mut self, artifact: ArtifactRef) {
        self.entries.push(artifact);
    }

    /// Appends an artifact, builder style.
    #[must_use]
    pub fn with(mut self, artifact: ArtifactRef) -> Self {
        self.push(artifact);
        self
    }

    /// Returns the number of configured artifacts.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no artifacts are configured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns artifacts in synchronization order.
    #[must_use]
    pub fn ordered(&self) -> Vec<&ArtifactRef> {
        let mut ordered = self.entries.iter().collect::<Vec<_>>();
        // Stable sort keeps caller order inside each category.
        ordered.sort_by_key(|artifact| artifact.category());
        ordered
    }
}

impl FromIterator<ArtifactRef> for ArtifactSet {
    fn from_iter<T: IntoIterator<Item = ArtifactRef>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
