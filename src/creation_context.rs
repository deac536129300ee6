// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Resource creation from any thread.

Binding-based contexts are only usable from the thread they are current on.
The render thread keeps the device's primary context current between
[`GraphicsDevice::begin`] and [`GraphicsDevice::end`]; every other thread
borrows the device's secondary context instead.

[`CreationContext`] is the guard for either case.  On the render thread it
lends out the primary driver.  Elsewhere the outermost guard on a thread takes
the process-wide creation slot and makes the secondary context current; guards
acquired on that thread while it lives share that context.  Whichever of them
drops last flushes the work, releases the context and frees the slot, so at
most one secondary context is in use at any moment.

The guard itself doesn't hold the driver lock.  Call [`CreationContext::driver`]
for each batch of calls and let that lock go before creating anything else.
*/

use crate::device::GraphicsDevice;
use crate::driver::Driver;
use std::marker::PhantomData;
use std::sync::MutexGuard;
use std::thread::ThreadId;
use wasm_safe_mutex::{Guard, Mutex};

/// Held by whichever thread has a secondary context current, or by a paused
/// device.
pub(crate) static CREATION_SLOT: Mutex<()> = Mutex::new(());

pub(crate) type SlotGuard = Guard<'static, ()>;

struct Holder {
    thread: Option<ThreadId>,
    device: usize,
    depth: u32,
    slot: Option<SlotGuard>,
}

static HOLDER: Mutex<Holder> = Mutex::new(Holder {
    thread: None,
    device: 0,
    depth: 0,
    slot: None,
});

fn device_key<D: Driver>(device: &GraphicsDevice<D>) -> usize {
    std::ptr::from_ref(device).addr()
}

/// Joins the calling thread's open secondary context, if it has one.
///
/// # Panics
/// If that context belongs to a different device.
fn join_held(key: usize) -> bool {
    let mut holder = HOLDER.lock_sync();
    if holder.thread != Some(std::thread::current().id()) {
        return false;
    }
    assert!(
        holder.device == key,
        "a creation context for another device is already held on this thread"
    );
    holder.depth += 1;
    true
}

/// Leaves the calling thread's secondary context, returning the slot when
/// this was the last guard.
fn leave_held() -> Option<SlotGuard> {
    let mut holder = HOLDER.lock_sync();
    holder.depth -= 1;
    if holder.depth == 0 {
        holder.thread = None;
        holder.slot.take()
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Primary,
    Outermost,
    Nested,
}

/// A driver usable on the calling thread.  See the module docs.
pub struct CreationContext<'a, D: Driver> {
    device: &'a GraphicsDevice<D>,
    kind: Kind,
    //the secondary context is current on one thread only
    _thread_bound: PhantomData<*const ()>,
}

impl<'a, D: Driver> CreationContext<'a, D> {
    pub(crate) fn acquire(device: &'a GraphicsDevice<D>) -> Self {
        if device.holds_primary() {
            return CreationContext::new(device, Kind::Primary);
        }
        if join_held(device_key(device)) {
            return CreationContext::new(device, Kind::Nested);
        }
        CreationContext::outermost(device, CREATION_SLOT.lock_sync())
    }

    pub(crate) async fn acquire_async(device: &'a GraphicsDevice<D>) -> Self {
        if device.holds_primary() {
            return CreationContext::new(device, Kind::Primary);
        }
        if join_held(device_key(device)) {
            return CreationContext::new(device, Kind::Nested);
        }
        let slot = CREATION_SLOT.lock_async().await;
        CreationContext::outermost(device, slot)
    }

    fn new(device: &'a GraphicsDevice<D>, kind: Kind) -> Self {
        CreationContext {
            device,
            kind,
            _thread_bound: PhantomData,
        }
    }

    fn outermost(device: &'a GraphicsDevice<D>, slot: SlotGuard) -> Self {
        {
            let mut holder = HOLDER.lock_sync();
            holder.thread = Some(std::thread::current().id());
            holder.device = device_key(device);
            holder.depth = 1;
            holder.slot = Some(slot);
        }
        device.secondary().make_current();
        logwise::trace_sync!("secondary context acquired");
        CreationContext::new(device, Kind::Outermost)
    }

    /// Whether this guard lent out the render thread's own context.
    pub fn is_primary(&self) -> bool {
        self.kind == Kind::Primary
    }

    /// Whether an enclosing guard on this thread already made the context
    /// current.
    pub fn is_nested(&self) -> bool {
        self.kind == Kind::Nested
    }

    /// Locks the driver behind this context.
    ///
    /// Drop the returned lock before acquiring another creation context or
    /// creating a resource on this thread.
    pub fn driver(&self) -> MutexGuard<'_, D> {
        match self.kind {
            Kind::Primary => self.device.primary(),
            Kind::Outermost | Kind::Nested => self.device.secondary(),
        }
    }
}

impl<D: Driver> Drop for CreationContext<'_, D> {
    fn drop(&mut self) {
        if self.kind == Kind::Primary {
            //creation may have rebound things the command list tracks
            self.device.mark_primary_disturbed();
            return;
        }
        //the last guard out releases, whichever order they drop in
        let Some(slot) = leave_held() else {
            return;
        };
        {
            let mut driver = self.device.secondary();
            driver.flush();
            driver.release_current();
        }
        drop(slot);
        logwise::trace_sync!("secondary context released");
    }
}

impl<D: Driver> std::fmt::Debug for CreationContext<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationContext")
            .field("kind", &self.kind)
            .finish()
    }
}
