// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Scoped ownership of a shadow instance and its interface-address slot.
//!
//! Every early-exit path of the pre-CAC workflow must stop and unregister
//! the shadow instance (even one that never successfully started) and then
//! return the address slot to the pool. Owning both in one guard makes that
//! sequence unconditional: dropping the guard is the teardown.

use {
    crate::{
        coordinator::RadioState,
        phy::{AddressSlot, InstanceHandle, InstanceLifecycleApi},
    },
    std::sync::{Arc, Mutex},
    tracing::debug,
};

pub(crate) struct ShadowGuard {
    lifecycle: Arc<dyn InstanceLifecycleApi>,
    state: Arc<Mutex<RadioState>>,
    slot: Option<AddressSlot>,
    handle: Option<InstanceHandle>,
}

impl ShadowGuard {
    pub(crate) fn new(
        lifecycle: Arc<dyn InstanceLifecycleApi>,
        state: Arc<Mutex<RadioState>>,
        slot: AddressSlot,
    ) -> Self {
        Self { lifecycle, state, slot: Some(slot), handle: None }
    }

    /// Adopt the created shadow instance. From this point the guard owns its
    /// teardown.
    pub(crate) fn set_handle(&mut self, handle: InstanceHandle) {
        self.handle = Some(handle);
    }
}

impl Drop for ShadowGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("tearing down shadow instance {:?}", handle);
            self.lifecycle.stop_and_destroy(&handle);
        }
        if let Some(slot) = self.slot.take() {
            self.state.lock().unwrap().address_pool.release(slot);
        }
    }
}
