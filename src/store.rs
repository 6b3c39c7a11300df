//! Versioned artifact store for model bundles.
//!
//! One JSON file per version under a dedicated directory. Regression and
//! tier bundles live in separate namespaces (filename prefix + per-namespace
//! index) so the wrong model type can never be cross-loaded. Writes go
//! through a temp file and an atomic rename: a bundle is either fully
//! persisted or absent, and readers of "latest" never observe a partial file.
//!
//! Each save appends `version\tfilename` to an append-only index; "latest" is
//! the last index entry. Directories predating the index fall back to a
//! lexicographic filename scan (version strings are timestamp-prefixed, so
//! that order is chronological). Same-second version collisions get a
//! sequence suffix; the index keeps latest-wins intact for them. There is no
//! retention policy: versions accumulate indefinitely.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ArtifactKind, Result};
use crate::model::{ModelBundle, TierModelBundle};

/// Filename prefix per namespace.
fn prefix(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Regression => "model",
        ArtifactKind::Tier => "tier",
    }
}

/// Versioned save/load of model bundles.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a regression bundle; updates its version on collision and its
    /// path on success.
    pub fn save_regression(&self, bundle: &mut ModelBundle) -> Result<PathBuf> {
        let version = self.reserve_version(&bundle.version)?;
        bundle.version = version;
        let path = self.write_payload(ArtifactKind::Regression, &bundle.version, bundle)?;
        bundle.path = Some(path.clone());
        Ok(path)
    }

    /// Load the most recently saved regression bundle, if any.
    pub fn load_latest_regression(&self) -> Result<Option<ModelBundle>> {
        Ok(self
            .load_latest::<ModelBundle>(ArtifactKind::Regression)?
            .map(|(mut bundle, path)| {
                bundle.path = Some(path);
                bundle
            }))
    }

    /// Persist a tier bundle; same contract as [`Self::save_regression`].
    pub fn save_tier(&self, bundle: &mut TierModelBundle) -> Result<PathBuf> {
        let version = self.reserve_version(&bundle.version)?;
        bundle.version = version;
        let path = self.write_payload(ArtifactKind::Tier, &bundle.version, bundle)?;
        bundle.path = Some(path.clone());
        Ok(path)
    }

    /// Load the most recently saved tier bundle, if any.
    pub fn load_latest_tier(&self) -> Result<Option<TierModelBundle>> {
        Ok(self
            .load_latest::<TierModelBundle>(ArtifactKind::Tier)?
            .map(|(mut bundle, path)| {
                bundle.path = Some(path);
                bundle
            }))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn bundle_path(&self, version: &str) -> PathBuf {
        self.dir.join(format!("{version}.json"))
    }

    fn index_path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{}.index", prefix(kind)))
    }

    /// Resolve a free version string, suffixing on same-second collisions.
    fn reserve_version(&self, requested: &str) -> Result<String> {
        if !self.bundle_path(requested).exists() {
            return Ok(requested.to_string());
        }
        for seq in 2.. {
            let candidate = format!("{requested}-{seq}");
            if !self.bundle_path(&candidate).exists() {
                debug!(version = %candidate, "version collision, suffixed");
                return Ok(candidate);
            }
        }
        unreachable!("sequence space exhausted");
    }

    /// Temp-write, atomic rename, then index append.
    fn write_payload<T: Serialize>(
        &self,
        kind: ArtifactKind,
        version: &str,
        payload: &T,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let filename = format!("{version}.json");
        let final_path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!(".tmp-{filename}"));

        let serialized = serde_json::to_vec(payload)?;
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &final_path)?;

        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.index_path(kind))?;
        writeln!(index, "{version}\t{filename}")?;

        info!(version, path = %final_path.display(), "model bundle saved");
        Ok(final_path)
    }

    fn load_latest<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<Option<(T, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(None);
        }

        let path = match self.latest_from_index(kind)? {
            Some(path) if path.exists() => Some(path),
            // No index (or a stale entry): fall back to the filename scan.
            _ => self.latest_from_scan(kind)?,
        };

        let Some(path) = path else {
            return Ok(None);
        };

        let payload = serde_json::from_slice(&fs::read(&path)?)?;
        Ok(Some((payload, path)))
    }

    fn latest_from_index(&self, kind: ArtifactKind) -> Result<Option<PathBuf>> {
        let index_path = self.index_path(kind);
        if !index_path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(index_path)?;
        let last = contents
            .lines()
            .rev()
            .find_map(|line| line.split('\t').nth(1));
        Ok(last.map(|filename| self.dir.join(filename)))
    }

    fn latest_from_scan(&self, kind: ArtifactKind) -> Result<Option<PathBuf>> {
        let wanted_prefix = format!("{}-", prefix(kind));
        let mut candidates: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(&wanted_prefix) && name.ends_with(".json") {
                candidates.push(name);
            }
        }
        candidates.sort();
        Ok(candidates.pop().map(|name| self.dir.join(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic_frame;
    use crate::model::regression::train_model;
    use crate::model::tier::train_tier_classifier;
    use tempfile::tempdir;

    #[test]
    fn load_latest_on_missing_dir_is_none() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("never-created"));
        assert!(store.load_latest_regression().unwrap().is_none());
        assert!(store.load_latest_tier().unwrap().is_none());
    }

    #[test]
    fn round_trip_preserves_predictions_exactly() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let frame = synthetic_frame(120, 42);
        let (mut bundle, _, _) = train_model(&frame, 42).unwrap();
        store.save_regression(&mut bundle).unwrap();

        let loaded = store.load_latest_regression().unwrap().unwrap();
        assert_eq!(loaded.version, bundle.version);
        for row in frame.rows() {
            // Bit-identical, not merely approximate.
            assert_eq!(loaded.predict_row(row), bundle.predict_row(row));
        }
    }

    #[test]
    fn latest_wins_across_saves() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let frame = synthetic_frame(80, 42);
        let (mut first, _, _) = train_model(&frame, 1).unwrap();
        let (mut second, _, _) = train_model(&frame, 2).unwrap();

        store.save_regression(&mut first).unwrap();
        store.save_regression(&mut second).unwrap();

        let loaded = store.load_latest_regression().unwrap().unwrap();
        assert_eq!(loaded.version, second.version);
    }

    #[test]
    fn same_second_collisions_get_suffixed_versions() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let frame = synthetic_frame(80, 42);
        let (mut a, _, _) = train_model(&frame, 1).unwrap();
        let (mut b, _, _) = train_model(&frame, 2).unwrap();
        // Force the collision regardless of wall-clock timing.
        b.version = a.version.clone();

        store.save_regression(&mut a).unwrap();
        store.save_regression(&mut b).unwrap();

        assert_ne!(a.version, b.version);
        assert!(b.version.starts_with(&a.version));

        // Index order decides latest: the collided save came second.
        let loaded = store.load_latest_regression().unwrap().unwrap();
        assert_eq!(loaded.version, b.version);
    }

    #[test]
    fn namespaces_do_not_cross_load() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let frame = synthetic_frame(150, 42);
        let (mut tier, _, _) = train_tier_classifier(&frame, 42).unwrap();
        store.save_tier(&mut tier).unwrap();

        // Only a tier bundle exists; the regression namespace stays empty.
        assert!(store.load_latest_regression().unwrap().is_none());
        let loaded_tier = store.load_latest_tier().unwrap().unwrap();
        assert_eq!(loaded_tier.version, tier.version);
    }

    #[test]
    fn scan_fallback_handles_pre_index_directories() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let frame = synthetic_frame(80, 42);
        let (mut bundle, _, _) = train_model(&frame, 1).unwrap();
        store.save_regression(&mut bundle).unwrap();

        // Drop the index; the lexicographic scan must still resolve latest.
        std::fs::remove_file(dir.path().join("model.index")).unwrap();
        let loaded = store.load_latest_regression().unwrap().unwrap();
        assert_eq!(loaded.version, bundle.version);
    }

    #[test]
    fn no_partial_files_remain_after_save() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let frame = synthetic_frame(80, 42);
        let (mut bundle, _, _) = train_model(&frame, 1).unwrap();
        store.save_regression(&mut bundle).unwrap();

        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().into_owned();
            assert!(!name.starts_with(".tmp-"), "leftover temp file: {name}");
        }
    }
}
