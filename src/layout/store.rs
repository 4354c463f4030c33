//! LayoutStore - durable storage for layout/grouping/view configuration
//!
//! Loads the layout document from a primary JSON file with an optional
//! fallback (e.g. a bundled seed file), normalizing everything on the way in.
//! A corrupt or missing primary file converges back to a known-good document
//! on disk; if nothing on disk is usable the store runs on in-memory defaults
//! without writing anything.

use super::normalize::{
    normalize_document, normalize_global_groups, normalize_sections, normalize_settings,
    normalize_view_settings,
};
use super::types::{
    BusTarget, GlobalGroup, GroupSettings, LayoutDocument, LayoutSection, ViewSettings,
};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

struct LayoutInner {
    path: PathBuf,
    fallback: Option<PathBuf>,
    channels: BTreeSet<u16>,
    aux_buses: BTreeSet<u16>,
    doc: RwLock<LayoutDocument>,
}

/// Validated layout configuration backed by a JSON file
#[derive(Clone)]
pub struct LayoutStore {
    inner: Arc<LayoutInner>,
}

impl LayoutStore {
    pub fn new(
        path: PathBuf,
        fallback: Option<PathBuf>,
        channel_ids: &[u16],
        aux_ids: &[u16],
    ) -> Self {
        Self {
            inner: Arc::new(LayoutInner {
                path,
                fallback,
                channels: channel_ids.iter().copied().collect(),
                aux_buses: aux_ids.iter().copied().collect(),
                doc: RwLock::new(LayoutDocument::default()),
            }),
        }
    }

    /// Load the document from disk.
    ///
    /// Tries the primary file first, then the fallback; adopting the fallback
    /// re-persists it to the primary path so the file on disk self-heals.
    /// Never fails: with neither source usable the in-memory defaults stand
    /// and nothing is written.
    pub async fn load(&self) {
        if let Some(raw) = read_valid(&self.inner.path).await {
            let doc = normalize_document(&raw, &self.inner.channels, &self.inner.aux_buses);
            *self.inner.doc.write() = doc;
            debug!("Layout loaded from {}", self.inner.path.display());
            return;
        }

        if let Some(fallback) = &self.inner.fallback {
            if let Some(raw) = read_valid(fallback).await {
                let doc = normalize_document(&raw, &self.inner.channels, &self.inner.aux_buses);
                *self.inner.doc.write() = doc;
                info!(
                    "Layout restored from fallback {}, rewriting {}",
                    fallback.display(),
                    self.inner.path.display()
                );
                if let Err(e) = self.save().await {
                    warn!("Failed to rewrite layout file: {e:#}");
                }
                return;
            }
        }

        info!("No usable layout file, starting from defaults");
    }

    /// Persist the whole document to the primary file
    ///
    /// Serializes under the lock, then writes to a uniquely named temp file
    /// and renames it into place. Concurrent saves each get their own temp
    /// file, so only whole documents ever reach the primary path.
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.inner.doc.read())
            .context("Failed to serialize layout document")?;

        let path = &self.inner.path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // Temp names must never collide across overlapping saves
        static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));

        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e)
                .with_context(|| format!("Failed to move layout into {}", path.display()));
        }

        debug!("Layout saved to {}", path.display());
        Ok(())
    }

    /// Sections for one aux bus; unknown buses get the default-normalized
    /// empty layout (favorites + others over the full universe)
    pub fn get_aux_layout(&self, bus: u16) -> Vec<LayoutSection> {
        self.inner
            .doc
            .read()
            .aux
            .get(&bus)
            .cloned()
            .unwrap_or_else(|| normalize_sections(&[], &self.inner.channels))
    }

    pub fn get_global_groups(&self) -> Vec<GlobalGroup> {
        self.inner.doc.read().global_groups.clone()
    }

    pub fn get_global_settings(&self, target: BusTarget) -> GroupSettings {
        let doc = self.inner.doc.read();
        match target {
            BusTarget::Master => doc.global_settings.master.clone(),
            BusTarget::Gain => doc.global_settings.gain.clone(),
            BusTarget::Aux(id) => doc
                .global_settings
                .aux
                .get(&id)
                .cloned()
                .unwrap_or_else(GroupSettings::disabled),
        }
    }

    pub fn get_view_settings(&self, target: BusTarget) -> ViewSettings {
        let doc = self.inner.doc.read();
        match target {
            BusTarget::Master => doc.view_settings.master.clone(),
            BusTarget::Gain => doc.view_settings.gain.clone(),
            BusTarget::Aux(id) => doc.view_settings.aux.get(&id).cloned().unwrap_or_default(),
        }
    }

    /// Copy of the whole in-memory document
    pub fn document(&self) -> LayoutDocument {
        self.inner.doc.read().clone()
    }

    /// Replace one aux bus's section list
    ///
    /// Silent no-op for buses outside the configured universe: the UI should
    /// never expose such a target, and no file write occurs.
    pub async fn set_aux_layout(&self, bus: u16, raw: &Value) -> Result<()> {
        if !self.inner.aux_buses.contains(&bus) {
            debug!("Ignoring layout for unconfigured aux bus {bus}");
            return Ok(());
        }
        let sections = raw.as_array().map(Vec::as_slice).unwrap_or(&[]);
        let sections = normalize_sections(sections, &self.inner.channels);
        self.inner.doc.write().aux.insert(bus, sections);
        self.save().await
    }

    /// Replace the global group list
    pub async fn set_global_groups(&self, raw: &Value) -> Result<()> {
        let groups = raw.as_array().map(Vec::as_slice).unwrap_or(&[]);
        let groups = normalize_global_groups(groups, &self.inner.channels);
        self.inner.doc.write().global_groups = groups;
        self.save().await
    }

    /// Replace the group settings for one bus target
    pub async fn set_global_settings(&self, target: BusTarget, raw: &Value) -> Result<()> {
        let settings = normalize_settings(Some(raw));
        {
            let mut doc = self.inner.doc.write();
            match target {
                BusTarget::Master => doc.global_settings.master = settings,
                BusTarget::Gain => doc.global_settings.gain = settings,
                BusTarget::Aux(id) => {
                    if !self.inner.aux_buses.contains(&id) {
                        debug!("Ignoring settings for unconfigured aux bus {id}");
                        return Ok(());
                    }
                    doc.global_settings.aux.insert(id, settings);
                }
            }
        }
        self.save().await
    }

    /// Replace the view settings for one bus target
    pub async fn set_view_settings(&self, target: BusTarget, raw: &Value) -> Result<()> {
        let settings = normalize_view_settings(Some(raw));
        {
            let mut doc = self.inner.doc.write();
            match target {
                BusTarget::Master => doc.view_settings.master = settings,
                BusTarget::Gain => doc.view_settings.gain = settings,
                BusTarget::Aux(id) => {
                    if !self.inner.aux_buses.contains(&id) {
                        debug!("Ignoring view settings for unconfigured aux bus {id}");
                        return Ok(());
                    }
                    doc.view_settings.aux.insert(id, settings);
                }
            }
        }
        self.save().await
    }
}

/// Read and parse a layout file, returning the raw document only when it is
/// structurally valid (a JSON object with an `aux` field)
async fn read_valid(path: &Path) -> Option<Value> {
    let contents = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => {
            debug!("Layout file {} not readable: {e}", path.display());
            return None;
        }
    };
    let raw: Value = match serde_json::from_str(&contents) {
        Ok(v) => v,
        Err(e) => {
            warn!("Layout file {} is not valid JSON: {e}", path.display());
            return None;
        }
    };
    if !raw.is_object() || raw.get("aux").is_none() {
        warn!("Layout file {} is structurally invalid", path.display());
        return None;
    }
    Some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::types::SumMode;
    use serde_json::json;
    use tempfile::tempdir;

    fn make_store(path: PathBuf, fallback: Option<PathBuf>) -> LayoutStore {
        LayoutStore::new(path, fallback, &[1, 2, 3], &[1, 2])
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let store = make_store(path.clone(), None);

        store.load().await;

        assert!(!path.exists(), "defaults must not be written to disk");
        let sections = store.get_aux_layout(1);
        assert_eq!(sections[0].id, "favorites");
        assert_eq!(sections[1].channel_ids, vec![1, 2, 3]);
        assert!(store.get_global_groups().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_primary_recovers_from_fallback_and_self_heals() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let seed = dir.path().join("seed.json");

        std::fs::write(&path, "{ not json").unwrap();
        std::fs::write(
            &seed,
            json!({
                "version": 2,
                "aux": {"1": [{"id": "favorites", "channelIds": [2]}]},
                "globalGroups": [{"id": "band", "name": "Band", "channelIds": [1, 3]}]
            })
            .to_string(),
        )
        .unwrap();

        let store = make_store(path.clone(), Some(seed));
        store.load().await;

        assert_eq!(store.get_aux_layout(1)[0].channel_ids, vec![2]);
        assert_eq!(store.get_global_groups()[0].id, "band");

        // Primary file was overwritten with the adopted content
        let healed: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(healed["aux"]["1"][0]["channelIds"], json!([2]));
    }

    #[tokio::test]
    async fn test_structurally_invalid_primary_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.json");
        // Valid JSON, but no aux field
        std::fs::write(&path, r#"{"version": 2}"#).unwrap();

        let store = make_store(path, None);
        store.load().await;

        // Fell through to defaults
        assert_eq!(store.get_aux_layout(1).len(), 2);
    }

    #[tokio::test]
    async fn test_set_aux_layout_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let store = make_store(path.clone(), None);

        store
            .set_aux_layout(1, &json!([{"id": "favorites", "name": "x", "channelIds": [2]}]))
            .await
            .unwrap();

        let sections = store.get_aux_layout(1);
        assert_eq!(sections[0].id, "favorites");
        assert_eq!(sections[0].channel_ids, vec![2]);
        assert_eq!(sections[1].id, "others");
        assert_eq!(sections[1].channel_ids, vec![1, 3]);

        // Reload into a fresh store: normalization-equal document
        let reloaded = make_store(path, None);
        reloaded.load().await;
        assert_eq!(reloaded.document(), store.document());
    }

    #[tokio::test]
    async fn test_set_aux_layout_unknown_bus_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let store = make_store(path.clone(), None);

        store
            .set_aux_layout(99, &json!([{"id": "favorites", "channelIds": [1]}]))
            .await
            .unwrap();

        assert!(!path.exists(), "no-op must not write the file");
        // Unknown bus reads back as a default-normalized empty layout
        let sections = store.get_aux_layout(99);
        assert_eq!(sections[0].id, "favorites");
        assert!(sections[0].channel_ids.is_empty());
        assert_eq!(sections[1].channel_ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_settings_and_view_mutators_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("layout.json");
        let store = make_store(path.clone(), None);

        store
            .set_global_settings(BusTarget::Aux(2), &json!({"offsetDb": -6.0, "enabled": true}))
            .await
            .unwrap();
        store
            .set_view_settings(
                BusTarget::Master,
                &json!({"simpleControls": true, "mixOrder": [{"kind": "channel", "id": 3}]}),
            )
            .await
            .unwrap();
        // Unknown aux target: ignored, persisted document untouched
        store
            .set_global_settings(BusTarget::Aux(9), &json!({"enabled": true}))
            .await
            .unwrap();

        let reloaded = make_store(path, None);
        reloaded.load().await;

        let s = reloaded.get_global_settings(BusTarget::Aux(2));
        assert_eq!(s.offset_db, -6.0);
        assert!(s.enabled);
        assert_eq!(
            reloaded.get_global_settings(BusTarget::Aux(9)),
            GroupSettings::disabled()
        );
        let v = reloaded.get_view_settings(BusTarget::Master);
        assert!(v.simple_controls);
        assert_eq!(v.mix_order.len(), 1);
        // Untouched slots hold their defaults
        let gain = reloaded.get_global_settings(BusTarget::Gain);
        assert!(!gain.enabled);
        assert_eq!(gain.mode, SumMode::IgnoreInf);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_saves_never_share_a_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.json");
        let store = make_store(path.clone(), None);

        let sections = json!([{"id": "favorites", "channelIds": [2]}]);
        let groups = json!([{"id": "band", "channelIds": [1, 3]}]);
        let (a, b) = tokio::join!(
            store.set_aux_layout(1, &sections),
            store.set_global_groups(&groups)
        );
        a.unwrap();
        b.unwrap();

        // Whichever rename landed last published a complete document
        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("aux").is_some());

        // Every temp file was renamed or cleaned up
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n != "layout.json")
            .collect();
        assert!(leftovers.is_empty(), "stray files: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_set_global_groups_normalizes_input() {
        let dir = tempdir().unwrap();
        let store = make_store(dir.path().join("layout.json"), None);

        store
            .set_global_groups(&json!([
                {"id": "band", "channelIds": [2, 2, 42]},
                {"id": "band", "channelIds": [1]},
                {"name": "idless"}
            ]))
            .await
            .unwrap();

        let groups = store.get_global_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].channel_ids, vec![2]);
    }
}
