//! Mode guard: process-wide flags gating admission of new work.
//!
//! Reads are single atomic loads and never block. A flag can only be set by
//! acquiring a [`ModeLease`] through compare-and-set, and the lease clears the
//! flag exactly once when it is released or dropped. Whoever holds the lease
//! owns the mode; nobody else can flip it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};

/// A mutually exclusive activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Singing,
    Recording,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singing => write!(f, "singing"),
            Self::Recording => write!(f, "recording"),
        }
    }
}

/// Point-in-time copy of both flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModeFlags {
    pub singing: bool,
    pub recording: bool,
}

/// Published whenever a flag is set or cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub mode: Mode,
    pub active: bool,
}

const CHANGE_CAPACITY: usize = 32;

/// Shared singing/recording flags.
pub struct ModeGuard {
    singing: AtomicBool,
    recording: AtomicBool,
    changes: broadcast::Sender<ModeChange>,
}

impl Default for ModeGuard {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            singing: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            changes,
        }
    }
}

impl ModeGuard {
    /// Create a guard with both flags cleared.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_singing(&self) -> bool {
        self.singing.load(Ordering::Acquire)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub fn is_active(&self, mode: Mode) -> bool {
        self.flag(mode).load(Ordering::Acquire)
    }

    pub fn flags(&self) -> ModeFlags {
        ModeFlags {
            singing: self.is_singing(),
            recording: self.is_recording(),
        }
    }

    /// Observe flag transitions. Lagging receivers lose the oldest changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ModeChange> {
        self.changes.subscribe()
    }

    /// Atomically set the flag for `mode` if it is currently clear.
    ///
    /// Fails with [`CoreError::ModeBusy`] when another owner holds it.
    pub fn try_acquire(self: &Arc<Self>, mode: Mode) -> CoreResult<ModeLease> {
        self.flag(mode)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::ModeBusy(mode))?;

        info!("Mode {} engaged", mode);
        self.publish(mode, true);

        Ok(ModeLease {
            guard: Arc::clone(self),
            mode,
            released: false,
        })
    }

    fn flag(&self, mode: Mode) -> &AtomicBool {
        match mode {
            Mode::Singing => &self.singing,
            Mode::Recording => &self.recording,
        }
    }

    fn clear(&self, mode: Mode) {
        self.flag(mode).store(false, Ordering::Release);
        info!("Mode {} released", mode);
        self.publish(mode, false);
    }

    fn publish(&self, mode: Mode, active: bool) {
        if self.changes.send(ModeChange { mode, active }).is_err() {
            debug!("No mode observers for {} change", mode);
        }
    }
}

impl fmt::Debug for ModeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeGuard").field("flags", &self.flags()).finish()
    }
}

/// Ownership of one mode flag. Dropping it clears the flag.
#[derive(Debug)]
pub struct ModeLease {
    guard: Arc<ModeGuard>,
    mode: Mode,
    released: bool,
}

impl ModeLease {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Clear the flag now.
    pub fn release(mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if !self.released {
            self.released = true;
            self.guard.clear(self.mode);
        }
    }
}

impl Drop for ModeLease {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_clear() {
        let guard = ModeGuard::new();
        assert_eq!(guard.flags(), ModeFlags::default());
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let guard = ModeGuard::new();
        let lease = guard.try_acquire(Mode::Singing).unwrap();
        assert!(guard.is_singing());
        assert!(!guard.is_recording());

        let second = guard.try_acquire(Mode::Singing);
        assert!(matches!(second, Err(CoreError::ModeBusy(Mode::Singing))));

        lease.release();
        assert!(!guard.is_singing());
        assert!(guard.try_acquire(Mode::Singing).is_ok());
    }

    #[test]
    fn test_modes_are_independent() {
        let guard = ModeGuard::new();
        let _singing = guard.try_acquire(Mode::Singing).unwrap();
        let _recording = guard.try_acquire(Mode::Recording).unwrap();
        assert_eq!(
            guard.flags(),
            ModeFlags {
                singing: true,
                recording: true
            }
        );
    }

    #[test]
    fn test_drop_clears_exactly_once() {
        let guard = ModeGuard::new();
        let mut changes = guard.subscribe();

        {
            let lease = guard.try_acquire(Mode::Recording).unwrap();
            assert!(guard.is_active(Mode::Recording));
            lease.release();
        }

        assert!(!guard.is_recording());
        assert_eq!(
            changes.try_recv().unwrap(),
            ModeChange {
                mode: Mode::Recording,
                active: true
            }
        );
        assert_eq!(
            changes.try_recv().unwrap(),
            ModeChange {
                mode: Mode::Recording,
                active: false
            }
        );
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_lease_cleared_when_owner_panics() {
        let guard = ModeGuard::new();
        let shared = Arc::clone(&guard);

        let result = std::thread::spawn(move || {
            let _lease = shared.try_acquire(Mode::Singing).unwrap();
            panic!("sequence failed");
        })
        .join();

        assert!(result.is_err());
        assert!(!guard.is_singing());
    }
}
