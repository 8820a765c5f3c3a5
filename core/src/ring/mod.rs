//! Output ring: fixed rotation of device transfer slots
//!
//! Each slot holds one native block of interleaved `i16` samples and an
//! `in_flight` flag. The frame loop fills and submits slots in strict
//! rotation; the driver plays them and releases each through the
//! [`CompletionNotifier`], the only entry point used from the driver thread.
//!
//! # Protocol
//!
//! ```text
//! frame loop: wait_free(i) ─► write(i) ─► mark_in_flight(i) ─► driver.submit(i)
//! driver:                                     read(i) ─► notifier.complete(i)
//! ```
//!
//! Slot contents are only written while `in_flight` is false and only read by
//! the driver while it is true, so the per-slot lock is never contended.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::error::{AudioError, AudioResult};

mod notifier;


pub use notifier::CompletionNotifier;

/// Sample block owned by one slot
#[derive(Debug)]
pub struct SlotData {
    samples: Box<[i16]>,
    len: usize,
}

impl SlotData {
    /// Samples handed to the device on the last submit
    pub fn as_slice(&self) -> &[i16] {
        &self.samples[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Full-capacity block for the producer to write into
    pub(crate) fn block_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len.min(self.samples.len());
    }
}

#[derive(Debug)]
struct Slot {
    in_flight: AtomicBool,
    data: Mutex<SlotData>,
}

/// Fixed rotation of hardware transfer slots
#[derive(Debug)]
pub struct OutputRing {
    slots: Box<[Slot]>,
    slot_capacity: usize,
    /// Woken whenever a slot is released
    released: (Mutex<()>, Condvar),
}

impl OutputRing {
    /// Allocate `depth` slots of `slot_capacity` interleaved samples each
    pub fn new(depth: usize, slot_capacity: usize) -> AudioResult<Self> {
        let total = depth.saturating_mul(slot_capacity);
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(depth)
            .map_err(|_| AudioError::Allocation {
                what: "output ring slots",
                requested: total,
            })?;

        for _ in 0..depth {
            let mut block = Vec::new();
            block
                .try_reserve_exact(slot_capacity)
                .map_err(|_| AudioError::Allocation {
                    what: "output ring slots",
                    requested: total,
                })?;
            block.resize(slot_capacity, 0);
            slots.push(Slot {
                in_flight: AtomicBool::new(false),
                data: Mutex::new(SlotData {
                    samples: block.into_boxed_slice(),
                    len: 0,
                }),
            });
        }

        Ok(Self {
            slots: slots.into_boxed_slice(),
            slot_capacity,
            released: (Mutex::new(()), Condvar::new()),
        })
    }

    /// Number of slots
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Capacity of each slot in interleaved samples
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Handle for the driver to release slots with
    pub fn notifier(self: &Arc<Self>) -> CompletionNotifier {
        CompletionNotifier::new(Arc::clone(self))
    }

    pub fn is_in_flight(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|s| s.in_flight.load(Ordering::Acquire))
    }

    pub fn in_flight_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.in_flight.load(Ordering::Acquire))
            .count()
    }

    /// Copy of the samples last submitted through `index`
    pub fn slot_samples(&self, index: usize) -> Vec<i16> {
        self.slots
            .get(index)
            .map(|_| self.lock(index).as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Block until slot `index` is no longer in flight
    ///
    /// Returns how long the caller waited. With a `timeout`, gives up with
    /// [`AudioError::DeviceStalled`] instead of hanging the frame loop.
    pub fn wait_free(&self, index: usize, timeout: Option<Duration>) -> AudioResult<Duration> {
        let slot = &self.slots[index];
        if !slot.in_flight.load(Ordering::Acquire) {
            return Ok(Duration::ZERO);
        }

        let start = Instant::now();
        trace!("waiting for output slot {}", index);

        let (lock, cvar) = &self.released;
        let mut guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while slot.in_flight.load(Ordering::Acquire) {
            match timeout {
                None => {
                    guard = cvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
                }
                Some(limit) => {
                    let waited = start.elapsed();
                    if waited >= limit {
                        warn!("output slot {} still in flight after {:?}", index, waited);
                        return Err(AudioError::DeviceStalled { slot: index, waited });
                    }
                    guard = cvar
                        .wait_timeout(guard, limit - waited)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }

        Ok(start.elapsed())
    }

    /// Lock a slot's sample block
    pub fn lock(&self, index: usize) -> MutexGuard<'_, SlotData> {
        self.slots[index]
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock a slot's sample block unless someone else holds it
    ///
    /// For the device callback, which must never block.
    pub fn try_lock(&self, index: usize) -> Option<MutexGuard<'_, SlotData>> {
        match self.slots[index].data.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub(crate) fn mark_in_flight(&self, index: usize) {
        self.slots[index].in_flight.store(true, Ordering::Release);
    }

    /// Clear `in_flight` and wake waiters; false if the slot was already free
    pub(crate) fn release(&self, index: usize) -> bool {
        let Some(slot) = self.slots.get(index) else {
            return false;
        };
        let was_in_flight = slot.in_flight.swap(false, Ordering::AcqRel);

        // Take the lock so a waiter between its flag check and wait() cannot miss this
        let (lock, cvar) = &self.released;
        drop(lock.lock().unwrap_or_else(PoisonError::into_inner));
        cvar.notify_all();

        was_in_flight
    }

    /// Wait until no slot is in flight, bounded by `timeout`
    pub fn drain(&self, timeout: Option<Duration>) -> AudioResult<()> {
        for index in 0..self.depth() {
            self.wait_free(index, timeout)?;
        }
        Ok(())
    }
}
