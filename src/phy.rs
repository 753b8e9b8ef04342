// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Phy-level collaborator seams: the asynchronous hardware-mode
//! (channel-bandwidth / MAC-pairing) service, the beacon/instance lifecycle
//! service, and the shared interface-address allocation pool.

use {
    crate::{
        channel::Channel,
        error::AcsError,
        switch::ChannelSwitchWaiter,
    },
    async_trait::async_trait,
};

/// Opaque handle to an instance registered with the lifecycle service.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct InstanceHandle(pub u64);

/// Parameters for a disposable shadow instance: a structurally valid beacon
/// under a derived name, on the candidate channel being assessed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShadowConfig {
    pub ssid: String,
    pub password: Vec<u8>,
    pub channel: Channel,
}

/// Hardware-mode service. A mode change re-pairs MAC chains for the target
/// channel's band/bandwidth and completes asynchronously; completion is
/// observed through the returned waiter.
pub trait HardwareModeApi: Send + Sync {
    fn request_mode_change(&self, channel: Channel) -> ChannelSwitchWaiter;
}

/// Beacon/instance lifecycle service.
#[async_trait]
pub trait InstanceLifecycleApi: Send + Sync {
    fn create_instance(&self, config: &ShadowConfig) -> Result<InstanceHandle, anyhow::Error>;

    /// Start beaconing and run the clear-channel assessment on the instance's
    /// channel. Resolves `Ok` once the CAC period passes without radar;
    /// resolves `Err` on a start failure or radar detection.
    async fn start(&self, handle: &InstanceHandle) -> Result<(), anyhow::Error>;

    /// Stop and unregister the instance. Safe to call for instances that
    /// never successfully started.
    fn stop_and_destroy(&self, handle: &InstanceHandle);
}

/// Marker for one allocated interface address. Returned to the pool through
/// `IfaceAddressPool::release`; the shadow guard owns this for the lifetime
/// of a pre-CAC session.
#[derive(Debug, Eq, PartialEq)]
pub struct AddressSlot {
    index: usize,
}

/// Fixed-capacity allocator for the per-radio interface-address space.
/// Shared across all instances and mutated under the radio-wide lock.
#[derive(Debug)]
pub struct IfaceAddressPool {
    in_use: Vec<bool>,
}

impl IfaceAddressPool {
    pub fn new(capacity: usize) -> Self {
        Self { in_use: vec![false; capacity] }
    }

    pub fn allocate(&mut self) -> Result<AddressSlot, AcsError> {
        match self.in_use.iter().position(|used| !used) {
            Some(index) => {
                self.in_use[index] = true;
                Ok(AddressSlot { index })
            }
            None => Err(AcsError::ResourceExhaustion("interface address pool")),
        }
    }

    pub fn release(&mut self, slot: AddressSlot) {
        self.in_use[slot.index] = false;
    }

    pub fn available(&self) -> usize {
        self.in_use.iter().filter(|used| !**used).count()
    }
}
