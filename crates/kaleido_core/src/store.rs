//! Configuration Store
//!
//! Owns the single authoritative [`VizConfig`] snapshot:
//! - loads it from a [`StorageProvider`] at startup (silent default fallback)
//! - merges validated patches and persists the result
//! - notifies subscribers with the full post-merge snapshot, in
//!   registration order
//!
//! Persistence failures degrade to in-memory operation with a warning;
//! they never fail the update that triggered them.

use tracing::{debug, warn};

use kaleido_host::StorageProvider;

use crate::config::{validate_patch, ConfigPatch, VizConfig};
use crate::error::{CoreError, CoreResult};

/// Key the configuration document is stored under
pub const STORAGE_KEY: &str = "kaleido-visualizer-config";

/// Subscription handle returned by [`ConfigStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type SubscriberFn = Box<dyn FnMut(&VizConfig)>;

pub struct ConfigStore {
    snapshot: VizConfig,
    storage: Box<dyn StorageProvider>,
    subscribers: Vec<(SubscriberId, SubscriberFn)>,
    next_subscriber: u64,
    defaulted: bool,
}

impl ConfigStore {
    /// Load the persisted document, merging it over defaults so fields a
    /// newer schema added are still populated. Any read or parse failure
    /// falls back to pure defaults.
    pub fn load(storage: Box<dyn StorageProvider>) -> Self {
        let mut defaulted = true;
        let snapshot = match storage.read(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<ConfigPatch>(&raw) {
                Ok(patch) => {
                    defaulted = false;
                    VizConfig::default().merged_with(&patch)
                }
                Err(err) => {
                    warn!("stored configuration is unreadable, using defaults: {err}");
                    VizConfig::default()
                }
            },
            Ok(None) => {
                debug!("no stored configuration, using defaults");
                VizConfig::default()
            }
            Err(err) => {
                warn!("configuration storage unavailable, using defaults: {err}");
                VizConfig::default()
            }
        };

        Self {
            snapshot,
            storage,
            subscribers: Vec::new(),
            next_subscriber: 0,
            defaulted,
        }
    }

    /// Whether [`load`](Self::load) found no usable stored document
    pub fn was_defaulted(&self) -> bool {
        self.defaulted
    }

    pub fn get(&self) -> &VizConfig {
        &self.snapshot
    }

    /// Validate, merge, persist, then notify. On validation failure the
    /// snapshot is untouched and subscribers are not called.
    pub fn update(&mut self, patch: &ConfigPatch) -> CoreResult<()> {
        let report = validate_patch(patch);
        if !report.valid {
            return Err(CoreError::ConfigValidation(report.errors));
        }
        if patch.is_empty() {
            return Ok(());
        }

        self.snapshot = self.snapshot.merged_with(patch);
        self.persist();
        self.notify();
        Ok(())
    }

    /// Update a single section; the rest of the snapshot is untouched
    pub fn update_section<P: Into<ConfigPatch>>(&mut self, section: P) -> CoreResult<()> {
        self.update(&section.into())
    }

    /// Drop the snapshot back to defaults, persist, and notify
    pub fn reset_to_defaults(&mut self) {
        self.snapshot = VizConfig::default();
        self.persist();
        self.notify();
    }

    /// Serialize the current snapshot as a pretty-printed document
    pub fn export_snapshot(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot)?)
    }

    /// Parse an exported document and apply it as a patch. Malformed input
    /// is an [`ImportParse`](CoreError::ImportParse) error; out-of-range
    /// values fail validation like any other update.
    pub fn import_snapshot(&mut self, raw: &str) -> CoreResult<()> {
        let patch: ConfigPatch =
            serde_json::from_str(raw).map_err(|err| CoreError::ImportParse(err.to_string()))?;
        self.update(&patch)
    }

    pub fn subscribe(&mut self, callback: SubscriberFn) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    fn persist(&self) {
        let raw = match serde_json::to_string(&self.snapshot) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to serialize configuration: {err}");
                return;
            }
        };
        if let Err(err) = self.storage.write(STORAGE_KEY, &raw) {
            warn!("failed to persist configuration, continuing in memory: {err}");
        }
    }

    fn notify(&mut self) {
        // Split borrows: subscribers get the snapshot by reference
        let snapshot = &self.snapshot;
        for (_, callback) in &mut self.subscribers {
            callback(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use kaleido_host::testing::BrokenStorage;
    use kaleido_host::MemoryStorage;

    use super::*;
    use crate::config::{AudioPatch, PresetsPatch};

    #[test]
    fn test_load_falls_back_to_defaults() {
        let store = ConfigStore::load(Box::new(MemoryStorage::new()));
        assert_eq!(store.get(), &VizConfig::default());
        assert!(store.was_defaulted());
    }

    #[test]
    fn test_load_merges_partial_stored_document() {
        let storage =
            MemoryStorage::with_entry(STORAGE_KEY, r#"{"audio": {"sensitivity": 1.4}}"#);
        let store = ConfigStore::load(Box::new(storage));
        assert_eq!(store.get().audio.sensitivity, 1.4);
        // Unmentioned fields come from the defaults
        assert_eq!(store.get().audio.fft_size, 2048);
        assert!(!store.was_defaulted());
    }

    #[test]
    fn test_load_ignores_corrupt_document() {
        let storage = MemoryStorage::with_entry(STORAGE_KEY, "{not json");
        let store = ConfigStore::load(Box::new(storage));
        assert_eq!(store.get(), &VizConfig::default());
        assert!(store.was_defaulted());
    }

    #[test]
    fn test_update_persists_and_survives_reload() {
        let storage = MemoryStorage::new();
        let mut store = ConfigStore::load(Box::new(storage.clone()));
        store
            .update(&ConfigPatch {
                presets: Some(PresetsPatch {
                    current_preset: Some("nebula".into()),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();

        let reloaded = ConfigStore::load(Box::new(storage));
        assert_eq!(reloaded.get().presets.current_preset, "nebula");
    }

    #[test]
    fn test_invalid_update_leaves_snapshot_untouched() {
        let mut store = ConfigStore::load(Box::new(MemoryStorage::new()));
        let seen = Rc::new(RefCell::new(0u32));
        let seen2 = Rc::clone(&seen);
        store.subscribe(Box::new(move |_| *seen2.borrow_mut() += 1));

        let err = store
            .update(&ConfigPatch {
                audio: Some(AudioPatch {
                    sensitivity: Some(5.0),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap_err();

        assert!(matches!(err, CoreError::ConfigValidation(_)));
        assert_eq!(store.get().audio.sensitivity, 1.0);
        assert_eq!(*seen.borrow(), 0);
    }

    #[test]
    fn test_subscribers_notified_in_registration_order() {
        let mut store = ConfigStore::load(Box::new(MemoryStorage::new()));
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = Rc::clone(&order);
        store.subscribe(Box::new(move |_| o.borrow_mut().push("first")));
        let o = Rc::clone(&order);
        let second = store.subscribe(Box::new(move |_| o.borrow_mut().push("second")));
        let o = Rc::clone(&order);
        store.subscribe(Box::new(move |_| o.borrow_mut().push("third")));

        store
            .update(&ConfigPatch {
                audio: Some(AudioPatch {
                    sensitivity: Some(0.5),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);

        order.borrow_mut().clear();
        store.unsubscribe(second);
        store.reset_to_defaults();
        assert_eq!(*order.borrow(), vec!["first", "third"]);
    }

    #[test]
    fn test_update_section_touches_only_its_section() {
        let mut store = ConfigStore::load(Box::new(MemoryStorage::new()));
        store
            .update_section(AudioPatch {
                sensitivity: Some(1.5),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.get().audio.sensitivity, 1.5);

        let mut expected = VizConfig::default();
        expected.audio.sensitivity = 1.5;
        assert_eq!(store.get(), &expected);
    }

    #[test]
    fn test_write_failure_keeps_in_memory_snapshot() {
        let mut store = ConfigStore::load(Box::new(BrokenStorage));
        store
            .update(&ConfigPatch {
                audio: Some(AudioPatch {
                    smoothing: Some(0.5),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.get().audio.smoothing, 0.5);
    }

    #[test]
    fn test_import_rejects_malformed_then_out_of_range() {
        let mut store = ConfigStore::load(Box::new(MemoryStorage::new()));
        assert!(matches!(
            store.import_snapshot("not json").unwrap_err(),
            CoreError::ImportParse(_)
        ));
        assert!(matches!(
            store
                .import_snapshot(r#"{"performance": {"targetFps": 90}}"#)
                .unwrap_err(),
            CoreError::ConfigValidation(_)
        ));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut store = ConfigStore::load(Box::new(MemoryStorage::new()));
        store
            .update(&ConfigPatch {
                audio: Some(AudioPatch {
                    fft_size: Some(4096),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();
        let exported = store.export_snapshot().unwrap();

        let mut other = ConfigStore::load(Box::new(MemoryStorage::new()));
        other.import_snapshot(&exported).unwrap();
        assert_eq!(other.get(), store.get());
    }
}
