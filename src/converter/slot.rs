use crate::page_size::MediaSize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// Waiting for the rendering engine to report the content ready
    Rendering,
    /// Layout and write through the print pipeline, then encoding
    Writing,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Rendering => "rendering",
            JobPhase::Writing => "writing",
        }
    }
}

/// What the slot records about the job that occupies it
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub output_file: PathBuf,
    pub media_size: MediaSize,
    pub encode_base64: bool,
    pub phase: JobPhase,
}

/// Single job slot. Occupied means busy.
#[derive(Debug, Default)]
pub struct JobSlot {
    active: Mutex<Option<JobSnapshot>>,
}

impl JobSlot {
    fn lock(&self) -> MutexGuard<'_, Option<JobSnapshot>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Occupy the slot with `job`, or return `None` without touching it when
    /// another job already holds it.
    pub fn try_acquire(self: &Arc<Self>, job: JobSnapshot) -> Option<SlotGuard> {
        let mut active = self.lock();
        if active.is_some() {
            return None;
        }
        *active = Some(job);
        Some(SlotGuard {
            slot: Arc::clone(self),
        })
    }

    pub fn snapshot(&self) -> Option<JobSnapshot> {
        self.lock().clone()
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }
}

/// Proof of slot ownership. The slot is emptied when this is dropped,
/// including on early return and unwinding.
#[derive(Debug)]
pub struct SlotGuard {
    slot: Arc<JobSlot>,
}

impl SlotGuard {
    pub fn set_phase(&self, phase: JobPhase) {
        if let Some(job) = self.slot.lock().as_mut() {
            job.phase = phase;
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}
