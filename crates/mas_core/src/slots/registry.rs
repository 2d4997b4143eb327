//! Registry of visible job slots.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::types::{PreviewArtifact, SlotError, SlotId, SlotPhase, SlotSnapshot};

#[derive(Debug)]
struct JobSlot {
    label: String,
    progress: f32,
    status_text: String,
    preview: Option<PreviewArtifact>,
    phase: SlotPhase,
    succeeded: Option<bool>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: BTreeMap<SlotId, JobSlot>,
    revision: u64,
}

/// Allocates slot ids and holds each slot's progress, status and preview.
///
/// All state sits behind a single mutex: allocation needs to scan for the
/// smallest free id and insert in one step.
#[derive(Debug, Default)]
pub struct JobSlotRegistry {
    inner: Mutex<Inner>,
}

impl JobSlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the smallest unused id and create an active slot at 0%.
    pub fn allocate(&self, label: impl Into<String>) -> SlotId {
        let label = label.into();
        let mut inner = self.inner.lock();

        let mut id: SlotId = 0;
        for &taken in inner.slots.keys() {
            if taken != id {
                break;
            }
            id += 1;
        }

        tracing::debug!(slot = id, label = %label, "allocated slot");
        inner.slots.insert(
            id,
            JobSlot {
                label,
                progress: 0.0,
                status_text: "loading...".to_string(),
                preview: None,
                phase: SlotPhase::Active,
                succeeded: None,
            },
        );
        inner.revision += 1;
        id
    }

    /// Remove a slot. Its id becomes available immediately.
    pub fn release(&self, id: SlotId) -> Option<SlotSnapshot> {
        let mut inner = self.inner.lock();
        let removed = inner.slots.remove(&id).map(|slot| snapshot_of(id, &slot));
        if removed.is_some() {
            inner.revision += 1;
            tracing::debug!(slot = id, "released slot");
        }
        removed
    }

    /// Set progress (clamped to 0-100). Progress never moves backwards.
    pub fn update_progress(&self, id: SlotId, percent: f32) -> Result<(), SlotError> {
        self.with_slot(id, |slot| {
            let clamped = if percent.is_nan() {
                slot.progress
            } else {
                percent.clamp(0.0, 100.0)
            };
            if clamped > slot.progress {
                slot.progress = clamped;
            }
        })
    }

    /// Replace the slot's status line.
    pub fn update_status_text(&self, id: SlotId, text: impl Into<String>) -> Result<(), SlotError> {
        let text = text.into();
        self.with_slot(id, move |slot| slot.status_text = text)
    }

    /// Replace the slot's preview.
    pub fn set_preview_artifact(
        &self,
        id: SlotId,
        artifact: PreviewArtifact,
    ) -> Result<(), SlotError> {
        self.with_slot(id, move |slot| slot.preview = Some(artifact))
    }

    /// Move a slot into its grace period with the job's final result.
    pub fn mark_draining(&self, id: SlotId, succeeded: bool) -> Result<(), SlotError> {
        self.with_slot(id, |slot| {
            slot.phase = SlotPhase::Draining;
            slot.succeeded = Some(succeeded);
        })
    }

    /// Snapshot one slot.
    pub fn snapshot(&self, id: SlotId) -> Option<SlotSnapshot> {
        self.inner.lock().slots.get(&id).map(|s| snapshot_of(id, s))
    }

    /// Snapshot every slot in id order.
    pub fn snapshots(&self) -> Vec<SlotSnapshot> {
        self.inner
            .lock()
            .slots
            .iter()
            .map(|(&id, slot)| snapshot_of(id, slot))
            .collect()
    }

    /// Ids currently allocated.
    pub fn ids(&self) -> Vec<SlotId> {
        self.inner.lock().slots.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }

    /// Counter bumped on every change; lets a renderer skip unchanged frames.
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    fn with_slot(&self, id: SlotId, f: impl FnOnce(&mut JobSlot)) -> Result<(), SlotError> {
        let mut inner = self.inner.lock();
        match inner.slots.get_mut(&id) {
            Some(slot) => {
                f(slot);
                inner.revision += 1;
                Ok(())
            }
            None => Err(SlotError::UnknownSlot(id)),
        }
    }
}

fn snapshot_of(id: SlotId, slot: &JobSlot) -> SlotSnapshot {
    SlotSnapshot {
        id,
        label: slot.label.clone(),
        progress: slot.progress,
        status_text: slot.status_text.clone(),
        phase: slot.phase,
        succeeded: slot.succeeded,
        preview: slot.preview.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn allocates_smallest_unused_id() {
        let registry = JobSlotRegistry::new();
        assert_eq!(registry.allocate("a"), 0);
        assert_eq!(registry.allocate("b"), 1);
        assert_eq!(registry.allocate("c"), 2);

        registry.release(1);
        assert_eq!(registry.allocate("d"), 1);
        assert_eq!(registry.allocate("e"), 3);
    }

    #[test]
    fn released_id_is_reusable_immediately() {
        let registry = JobSlotRegistry::new();
        let id = registry.allocate("only");
        registry.release(id);
        assert!(registry.is_empty());
        assert_eq!(registry.allocate("again"), id);
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let registry = JobSlotRegistry::new();
        let id = registry.allocate("Asciify: cat");

        registry.update_progress(id, 40.0).unwrap();
        registry.update_progress(id, 25.0).unwrap();
        assert_eq!(registry.snapshot(id).unwrap().progress, 40.0);

        registry.update_progress(id, 250.0).unwrap();
        assert_eq!(registry.snapshot(id).unwrap().progress, 100.0);
    }

    #[test]
    fn updates_after_release_report_unknown_slot() {
        let registry = JobSlotRegistry::new();
        let id = registry.allocate("gone");
        registry.release(id);

        assert_eq!(
            registry.update_progress(id, 50.0),
            Err(SlotError::UnknownSlot(id))
        );
        assert_eq!(
            registry.update_status_text(id, "late"),
            Err(SlotError::UnknownSlot(id))
        );
        assert!(registry
            .set_preview_artifact(id, PreviewArtifact::Text(Arc::from("x")))
            .is_err());
    }

    #[test]
    fn snapshot_reflects_updates() {
        let registry = JobSlotRegistry::new();
        let id = registry.allocate("GAN: GAN");
        let before = registry.revision();

        registry.update_status_text(id, "generating image...").unwrap();
        registry
            .set_preview_artifact(id, PreviewArtifact::Text(Arc::from("@@")))
            .unwrap();
        registry.mark_draining(id, true).unwrap();

        let snap = registry.snapshot(id).unwrap();
        assert_eq!(snap.label, "GAN: GAN");
        assert_eq!(snap.status_text, "generating image...");
        assert_eq!(snap.phase, SlotPhase::Draining);
        assert_eq!(snap.succeeded, Some(true));
        assert_eq!(snap.preview.unwrap().kind(), "text");
        assert!(registry.revision() > before);
    }

    #[test]
    fn concurrent_allocations_get_distinct_ids() {
        let registry = Arc::new(JobSlotRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.allocate(format!("job {i}")))
            })
            .collect();

        let mut ids: Vec<SlotId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
    }
}
