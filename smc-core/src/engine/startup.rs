//! Startup override countdown
//!
//! For the first `D` drive ticks after installation the fan is held at a
//! fixed command while the loops settle. The counter only moves down and
//! the override never comes back once it has expired.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    Starting,
    Normal,
}

#[derive(Debug)]
pub struct StartupSequencer {
    remaining: AtomicU32,
}

impl StartupSequencer {
    pub fn new(duration_ticks: u32) -> Self {
        Self {
            remaining: AtomicU32::new(duration_ticks),
        }
    }

    /// Advance one drive tick and return the phase governing it
    ///
    /// A tick that finds the counter above zero decrements it and is still
    /// `Starting`; the first tick that finds it at zero is `Normal`.
    pub fn tick(&self) -> StartupPhase {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(_) => StartupPhase::Starting,
            Err(_) => StartupPhase::Normal,
        }
    }

    /// Phase the next tick would see, without advancing
    pub fn phase(&self) -> StartupPhase {
        if self.remaining() > 0 {
            StartupPhase::Starting
        } else {
            StartupPhase::Normal
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }
}
