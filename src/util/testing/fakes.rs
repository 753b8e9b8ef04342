// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
#![cfg(test)]

//! Scripted fakes for the collaborator traits.

use {
    crate::{
        catalog::{ChannelDescriptor, Pcl, PreferredChannelApi, RegulatoryApi},
        channel::{Channel, Cbw, RegulatoryClass},
        coordinator::{ScanSelection, SelectionEngineApi},
        phy::{HardwareModeApi, InstanceHandle, InstanceLifecycleApi, ShadowConfig},
        switch::{ChannelSwitchSignal, ChannelSwitchWaiter},
        types::HwModeHint,
    },
    anyhow::format_err,
    async_trait::async_trait,
    futures::channel::oneshot,
    std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicBool, AtomicU64, Ordering},
            Mutex,
        },
    },
};

/// A US-like regulatory domain: 2.4 GHz channels 1-14 (12-14 region
/// restricted), U-NII-1 and U-NII-3 non-DFS, U-NII-2A/2C DFS.
pub struct FakeRegulatory {
    channels: Vec<ChannelDescriptor>,
    restricted: Vec<u8>,
}

impl FakeRegulatory {
    pub fn with_default_domain() -> Self {
        let mut channels = Vec::new();
        for n in 1..=13u8 {
            channels.push(ChannelDescriptor {
                number: n,
                center_freq_mhz: 2407 + 5 * n as u16,
                class: RegulatoryClass::NonDfs,
            });
        }
        channels.push(ChannelDescriptor {
            number: 14,
            center_freq_mhz: 2484,
            class: RegulatoryClass::NonDfs,
        });
        let five_ghz = [
            (36, RegulatoryClass::NonDfs),
            (40, RegulatoryClass::NonDfs),
            (44, RegulatoryClass::NonDfs),
            (48, RegulatoryClass::NonDfs),
            (52, RegulatoryClass::Dfs),
            (56, RegulatoryClass::Dfs),
            (60, RegulatoryClass::Dfs),
            (64, RegulatoryClass::Dfs),
            (100, RegulatoryClass::Dfs),
            (104, RegulatoryClass::Dfs),
            (108, RegulatoryClass::Dfs),
            (112, RegulatoryClass::Dfs),
            (116, RegulatoryClass::Dfs),
            (120, RegulatoryClass::Dfs),
            (124, RegulatoryClass::Dfs),
            (128, RegulatoryClass::Dfs),
            (132, RegulatoryClass::Dfs),
            (136, RegulatoryClass::Dfs),
            (140, RegulatoryClass::Dfs),
            (144, RegulatoryClass::Dfs),
            (149, RegulatoryClass::NonDfs),
            (153, RegulatoryClass::NonDfs),
            (157, RegulatoryClass::NonDfs),
            (161, RegulatoryClass::NonDfs),
            (165, RegulatoryClass::NonDfs),
        ];
        for (n, class) in five_ghz {
            channels.push(ChannelDescriptor {
                number: n,
                center_freq_mhz: 5000 + 5 * n as u16,
                class,
            });
        }
        Self { channels, restricted: vec![12, 13, 14] }
    }

    pub fn with_disabled_channel(mut self, number: u8) -> Self {
        for desc in &mut self.channels {
            if desc.number == number {
                desc.class = RegulatoryClass::Disabled;
            }
        }
        self
    }
}

impl RegulatoryApi for FakeRegulatory {
    fn valid_channels(&self) -> Vec<ChannelDescriptor> {
        self.channels.clone()
    }

    fn channel_class(&self, number: u8) -> RegulatoryClass {
        self.channels
            .iter()
            .find(|d| d.number == number)
            .map(|d| d.class)
            .unwrap_or(RegulatoryClass::Disabled)
    }

    fn is_restricted_region_channel(&self, number: u8) -> bool {
        self.restricted.contains(&number)
    }
}

pub struct FakePreferredChannels {
    entries: Vec<(u8, u8)>,
}

impl FakePreferredChannels {
    pub fn new(entries: Vec<(u8, u8)>) -> Self {
        Self { entries }
    }
}

impl PreferredChannelApi for FakePreferredChannels {
    fn preferred_channels(&self, _mode: HwModeHint) -> Vec<(u8, u8)> {
        self.entries.clone()
    }
}

/// Selection engine with scripted results and optional per-call gates so a
/// test can hold a scan in flight.
pub struct FakeSelectionEngine {
    calls: Mutex<Vec<(Vec<u8>, Cbw)>>,
    results: Mutex<VecDeque<Result<ScanSelection, String>>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

impl FakeSelectionEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            gates: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_result(&self, selection: ScanSelection) {
        self.results.lock().unwrap().push_back(Ok(selection));
    }

    pub fn push_error(&self, message: &str) {
        self.results.lock().unwrap().push_back(Err(message.to_string()));
    }

    /// The next `start_selection` call will block until the returned sender
    /// fires.
    pub fn gate_next(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.gates.lock().unwrap().push_back(receiver);
        sender
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<(Vec<u8>, Cbw)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SelectionEngineApi for FakeSelectionEngine {
    async fn start_selection(
        &self,
        candidates: Vec<u8>,
        bandwidth_hint: Cbw,
        _pcl: Pcl,
    ) -> Result<ScanSelection, anyhow::Error> {
        self.calls.lock().unwrap().push((candidates.clone(), bandwidth_hint));
        let gate = self.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.results.lock().unwrap().pop_front() {
            Some(Ok(selection)) => Ok(selection),
            Some(Err(message)) => Err(format_err!("{}", message)),
            // Unscripted calls pick the first candidate at 20 MHz semantics.
            None => Ok(ScanSelection {
                primary: candidates.first().copied().unwrap_or(1),
                secondary: 0,
            }),
        }
    }
}

/// Hardware-mode service whose completion signals either fire immediately or
/// are held for the test to release.
pub struct FakeHardwareMode {
    requests: Mutex<Vec<Channel>>,
    hold: AtomicBool,
    pending: Mutex<Vec<ChannelSwitchSignal>>,
}

impl FakeHardwareMode {
    pub fn new() -> Self {
        Self { requests: Mutex::new(Vec::new()), hold: AtomicBool::new(false), pending: Mutex::new(Vec::new()) }
    }

    pub fn hold_completions(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn fire_all(&self) {
        for signal in self.pending.lock().unwrap().drain(..) {
            signal.signal();
        }
    }

    pub fn requested(&self) -> Vec<Channel> {
        self.requests.lock().unwrap().clone()
    }
}

impl HardwareModeApi for FakeHardwareMode {
    fn request_mode_change(&self, channel: Channel) -> ChannelSwitchWaiter {
        self.requests.lock().unwrap().push(channel);
        let (signal, waiter) = ChannelSwitchWaiter::pair();
        if self.hold.load(Ordering::SeqCst) {
            self.pending.lock().unwrap().push(signal);
        } else {
            signal.signal();
        }
        waiter
    }
}

pub enum StartBehavior {
    Succeed,
    Fail(String),
    Hang,
}

/// Lifecycle service recording creations and teardowns, with scripted start
/// behavior per instance.
pub struct FakeLifecycle {
    next_handle: AtomicU64,
    created: Mutex<Vec<(InstanceHandle, ShadowConfig)>>,
    destroyed: Mutex<Vec<InstanceHandle>>,
    create_fails: AtomicBool,
    start_behaviors: Mutex<VecDeque<StartBehavior>>,
}

impl FakeLifecycle {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            created: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
            create_fails: AtomicBool::new(false),
            start_behaviors: Mutex::new(VecDeque::new()),
        }
    }

    pub fn fail_create(&self) {
        self.create_fails.store(true, Ordering::SeqCst);
    }

    pub fn push_start_behavior(&self, behavior: StartBehavior) {
        self.start_behaviors.lock().unwrap().push_back(behavior);
    }

    pub fn shadow_configs(&self) -> Vec<ShadowConfig> {
        self.created.lock().unwrap().iter().map(|(_, config)| config.clone()).collect()
    }

    /// Instances created and not yet destroyed.
    pub fn registered_count(&self) -> usize {
        let created = self.created.lock().unwrap().len();
        let destroyed = self.destroyed.lock().unwrap().len();
        created - destroyed
    }
}

#[async_trait]
impl InstanceLifecycleApi for FakeLifecycle {
    fn create_instance(&self, config: &ShadowConfig) -> Result<InstanceHandle, anyhow::Error> {
        if self.create_fails.load(Ordering::SeqCst) {
            return Err(format_err!("lifecycle refused to create instance"));
        }
        let handle = InstanceHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.created.lock().unwrap().push((handle.clone(), config.clone()));
        Ok(handle)
    }

    async fn start(&self, _handle: &InstanceHandle) -> Result<(), anyhow::Error> {
        let behavior =
            self.start_behaviors.lock().unwrap().pop_front().unwrap_or(StartBehavior::Succeed);
        match behavior {
            StartBehavior::Succeed => Ok(()),
            StartBehavior::Fail(message) => Err(format_err!("{}", message)),
            StartBehavior::Hang => {
                futures::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    fn stop_and_destroy(&self, handle: &InstanceHandle) {
        self.destroyed.lock().unwrap().push(handle.clone());
    }
}
