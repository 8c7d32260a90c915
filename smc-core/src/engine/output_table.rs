//! Per-loop output slots
//!
//! Each slot is an `AtomicU32` holding the bit pattern of an `f32`. A loop
//! owns exactly one slot, so a relaxed store per write and a relaxed load
//! per read is enough; the drive tick only needs the latest value of each
//! slot, not a consistent cut across them.

use std::sync::atomic::{AtomicU32, Ordering};

use smc_error::{Result, ThermalError};

#[derive(Debug)]
pub struct OutputTable {
    slots: Box<[AtomicU32]>,
}

impl OutputTable {
    /// Create `len` slots, all holding `initial`
    pub fn new(len: usize, initial: f32) -> Self {
        let slots = (0..len)
            .map(|_| AtomicU32::new(initial.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn write(&self, slot: usize, value: f32) -> Result<()> {
        let cell = self.slots.get(slot).ok_or_else(|| {
            ThermalError::invalid_argument(format!(
                "output slot {} out of range (table has {})",
                slot,
                self.slots.len()
            ))
        })?;
        cell.store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn read(&self, slot: usize) -> Option<f32> {
        self.slots
            .get(slot)
            .map(|cell| f32::from_bits(cell.load(Ordering::Relaxed)))
    }

    /// Copy every slot into `out`, reusing its allocation
    pub fn snapshot_into(&self, out: &mut Vec<f32>) {
        out.clear();
        out.extend(
            self.slots
                .iter()
                .map(|cell| f32::from_bits(cell.load(Ordering::Relaxed))),
        );
    }

    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.slots.len());
        self.snapshot_into(&mut out);
        out
    }
}
