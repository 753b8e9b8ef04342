// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-radio coordinator serializing scan-based channel selection across AP
//! instances.
//!
//! The underlying selection procedure is slow (active plus passive scan of
//! every candidate channel, worst case on the order of seconds) and must not
//! run concurrently, so a single admission slot is arbitrated here: one
//! in-progress selection per radio, at most one queued request per blocked
//! instance, and deferred dispatch of the queued one after the active one
//! completes.

use {
    crate::{
        catalog::{ChannelCatalog, Nol, Pcl, PreferredChannelApi},
        channel::{Cbw, Channel},
        config::CoordinatorConfig,
        dfs::{self, DfsVerdict},
        error::AcsError,
        phy::IfaceAddressPool,
        precac::{PreCacRecord, PreCacState},
        switch::{ChannelSwitchSignal, ChannelSwitchWaiter, SwitchWait},
        types::{
            AcsConfig, AcsEvent, ApInstance, ApInstanceId, BeaconTemplate, ChannelBounds,
            ChannelList, ChannelOrigin, EventSender, SelectionOrigin, SelectionOutcome,
        },
    },
    anyhow::format_err,
    async_trait::async_trait,
    std::{
        collections::{BTreeMap, HashMap, HashSet},
        sync::{Arc, Mutex},
    },
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

pub mod bounds;

/// Raw result of one scan-based selection, as reported by the engine. VHT
/// segment centers and the effective bandwidth are derived locally.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScanSelection {
    pub primary: u8,
    pub secondary: u8,
}

/// Scan/selection engine collaborator. Implementations scan the candidate
/// channels and pick the least-congested one, biased by the PCL.
#[async_trait]
pub trait SelectionEngineApi: Send + Sync {
    async fn start_selection(
        &self,
        candidates: Vec<u8>,
        bandwidth_hint: Cbw,
        pcl: Pcl,
    ) -> Result<ScanSelection, anyhow::Error>;
}

/// Outcome of an admission decision returned to the caller.
#[derive(Debug, Eq, PartialEq)]
pub enum AcsDecision {
    /// The selection (or forced completion) started; the result arrives as
    /// an `AcsEvent`.
    Accepted,
    /// Another instance holds the slot; the request was recorded and will be
    /// dispatched after the active selection completes.
    Queued,
}

/// Tagged admission state of the radio's single selection slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Admission {
    Idle,
    Active { holder: ApInstanceId },
}

/// Parameters of the selection currently holding the slot.
#[derive(Debug)]
struct ActiveSelection {
    iface_id: ApInstanceId,
    config: AcsConfig,
    cbw: Cbw,
}

/// All mutable per-radio state, guarded by one mutex. The NOL, the address
/// pool, and the pre-CAC session record share this lock with the admission
/// logic since admission is inherently serial.
pub(crate) struct RadioState {
    pub(crate) admission: Admission,
    /// Queue depth of one per instance; an insert replaces.
    pub(crate) pending: BTreeMap<ApInstanceId, AcsConfig>,
    pub(crate) instances: HashMap<ApInstanceId, ApInstance>,
    pub(crate) nol: Nol,
    pub(crate) address_pool: IfaceAddressPool,
    pub(crate) precac: Option<PreCacRecord>,
    pub(crate) precac_last: Option<PreCacState>,
    pub(crate) precac_task: Option<JoinHandle<()>>,
    active: Option<ActiveSelection>,
    selection_task: Option<JoinHandle<()>>,
    dispatch: Option<(ApInstanceId, JoinHandle<()>)>,
}

impl RadioState {
    pub(crate) fn new(address_capacity: usize) -> Self {
        Self {
            admission: Admission::Idle,
            pending: BTreeMap::new(),
            instances: HashMap::new(),
            nol: Nol::new(),
            address_pool: IfaceAddressPool::new(address_capacity),
            precac: None,
            precac_last: None,
            precac_task: None,
            active: None,
            selection_task: None,
            dispatch: None,
        }
    }

    /// The candidate channel of the active pre-CAC session, if any.
    pub(crate) fn under_assessment(&self) -> Option<u8> {
        self.precac.as_ref().map(|record| record.target)
    }

    /// Channels currently assigned to any beaconing instance.
    pub(crate) fn assigned_channels(&self) -> HashSet<u8> {
        self.instances.values().filter_map(|inst| inst.channel.map(|c| c.primary)).collect()
    }
}

/// Per-radio singleton admitting at most one channel-selection procedure at
/// a time. Long-running work (the scan, the deferred dispatch timer, forced
/// completions waiting on a channel switch) runs in detached tasks that
/// re-enter the radio lock only to apply transitions.
pub struct AcsCoordinator {
    cfg: CoordinatorConfig,
    pub(crate) state: Arc<Mutex<RadioState>>,
    pub(crate) catalog: ChannelCatalog,
    policy: Arc<dyn PreferredChannelApi>,
    engine: Arc<dyn SelectionEngineApi>,
    pub(crate) events: EventSender,
}

impl AcsCoordinator {
    pub fn new(
        cfg: CoordinatorConfig,
        catalog: ChannelCatalog,
        policy: Arc<dyn PreferredChannelApi>,
        engine: Arc<dyn SelectionEngineApi>,
        events: EventSender,
    ) -> Arc<Self> {
        let state = Arc::new(Mutex::new(RadioState::new(cfg.max_instances)));
        Arc::new(Self { cfg, state, catalog, policy, engine, events })
    }

    pub(crate) fn config(&self) -> &CoordinatorConfig {
        &self.cfg
    }

    /// Register a new AP instance brought up by the upper layer.
    pub fn add_instance(
        &self,
        iface_id: ApInstanceId,
        beacon: BeaconTemplate,
    ) -> Result<(), AcsError> {
        let mut s = self.state.lock().unwrap();
        if s.instances.len() >= self.cfg.max_instances {
            return Err(AcsError::ConcurrencyRejected("no radio capacity for another instance"));
        }
        if s.instances.contains_key(&iface_id) {
            return Err(AcsError::Configuration(format!("{} already exists", iface_id)));
        }
        s.instances.insert(iface_id, ApInstance::new(iface_id, beacon));
        Ok(())
    }

    /// Tear an instance down. Releases the admission slot or the queued
    /// request it holds; an in-flight selection is aborted and surfaced as a
    /// failure, never left dangling. Callers running pre-CAC must also
    /// invoke `PreCacManager::handle_iface_removed`.
    pub fn remove_instance(self: &Arc<Self>, iface_id: ApInstanceId) -> Result<(), AcsError> {
        let mut s = self.state.lock().unwrap();
        if s.instances.remove(&iface_id).is_none() {
            return Err(AcsError::NoSuchInstance(iface_id));
        }
        let _ = s.pending.remove(&iface_id);
        if let Some((target, handle)) = s.dispatch.take() {
            if target == iface_id {
                handle.abort();
            } else {
                s.dispatch = Some((target, handle));
            }
        }
        if matches!(s.admission, Admission::Active { holder } if holder == iface_id) {
            if let Some(task) = s.selection_task.take() {
                task.abort();
            }
            s.admission = Admission::Idle;
            s.active = None;
            warn!("{} torn down while holding the selection slot", iface_id);
            self.events.send(AcsEvent::SelectionFailed {
                iface_id,
                error: AcsError::Internal(format_err!("{} torn down during selection", iface_id)),
            });
        }
        self.drain_pending_locked(&mut s);
        Ok(())
    }

    /// Record that an instance started beaconing on a channel chosen outside
    /// this coordinator (an explicit per-instance configuration when `list`
    /// is given).
    pub fn note_instance_started(
        &self,
        iface_id: ApInstanceId,
        channel: Channel,
        list: Option<Vec<u8>>,
    ) -> Result<(), AcsError> {
        let mut s = self.state.lock().unwrap();
        let inst =
            s.instances.get_mut(&iface_id).ok_or(AcsError::NoSuchInstance(iface_id))?;
        inst.channel = Some(channel);
        if let Some(list) = list {
            inst.origin = Some(ChannelOrigin::Explicit {
                list,
                outcome: SelectionOutcome::from_channel(channel),
            });
        }
        Ok(())
    }

    /// Register an in-flight channel/bandwidth change for an instance and
    /// hand back the completion signal for the switching side to fire.
    pub fn note_switch_started(
        &self,
        iface_id: ApInstanceId,
    ) -> Result<ChannelSwitchSignal, AcsError> {
        let mut s = self.state.lock().unwrap();
        let inst =
            s.instances.get_mut(&iface_id).ok_or(AcsError::NoSuchInstance(iface_id))?;
        let (signal, waiter) = ChannelSwitchWaiter::pair();
        inst.switch_in_flight = Some(waiter);
        Ok(signal)
    }

    /// Radar report from the driver's monitoring path.
    pub fn note_radar_detected(&self, channel: u8) {
        let mut s = self.state.lock().unwrap();
        dfs::record_radar(&mut s, channel);
    }

    /// Non-occupancy expiry report from the regulatory collaborator.
    pub fn note_non_occupancy_expired(&self, channel: u8) {
        let mut s = self.state.lock().unwrap();
        dfs::clear_non_occupancy(&mut s, channel);
    }

    /// Admit, queue, or reject a selection request. Never blocks: the slow
    /// scan runs in a detached task and reports back via `AcsEvent`.
    pub fn request_selection(
        self: &Arc<Self>,
        iface_id: ApInstanceId,
        config: AcsConfig,
    ) -> Result<AcsDecision, AcsError> {
        let mut s = self.state.lock().unwrap();
        if !s.instances.contains_key(&iface_id) {
            return Err(AcsError::NoSuchInstance(iface_id));
        }
        match s.admission {
            Admission::Active { holder } if holder == iface_id => {
                Err(AcsError::SelectionInProgress(iface_id))
            }
            Admission::Active { .. } => {
                // Reject a doomed config synchronously even when queuing.
                let _ = self.validate_candidates(&s, &config)?;
                if s.pending.insert(iface_id, config).is_some() {
                    debug!("replacing queued selection config for {}", iface_id);
                }
                Ok(AcsDecision::Queued)
            }
            Admission::Idle => {
                self.begin_selection_locked(&mut s, iface_id, config)?;
                Ok(AcsDecision::Accepted)
            }
        }
    }

    /// Apply a completed selection: release the slot, report the derived
    /// payload, and schedule dispatch of any queued request after the
    /// settling delay.
    pub fn on_selection_complete(
        self: &Arc<Self>,
        iface_id: ApInstanceId,
        primary: u8,
        secondary: u8,
    ) {
        let mut s = self.state.lock().unwrap();
        let active = match s.active.take() {
            Some(active) if active.iface_id == iface_id => active,
            other => {
                s.active = other;
                warn!("selection completion from {} does not match the slot holder", iface_id);
                return;
            }
        };
        s.admission = Admission::Idle;
        s.selection_task = None;

        let outcome = SelectionOutcome::from_scan(primary, secondary, active.cbw);
        if let Some(inst) = s.instances.get_mut(&iface_id) {
            inst.channel = Some(outcome.operating_channel());
            inst.origin = Some(ChannelOrigin::Acs { config: active.config, outcome });
        }
        info!(
            "{}: selection complete, primary {} secondary {} cbw {:?}",
            iface_id, outcome.primary, outcome.secondary, outcome.cbw
        );
        self.events.send(AcsEvent::SelectionComplete {
            iface_id,
            outcome,
            origin: SelectionOrigin::Scan,
        });
        self.drain_pending_locked(&mut s);
    }

    /// Invariant probe: current admission-slot holder.
    pub fn admission_holder(&self) -> Option<ApInstanceId> {
        match self.state.lock().unwrap().admission {
            Admission::Idle => None,
            Admission::Active { holder } => Some(holder),
        }
    }

    /// Invariant probe: whether an instance has a queued request.
    pub fn is_selection_pending(&self, iface_id: ApInstanceId) -> bool {
        self.state.lock().unwrap().pending.contains_key(&iface_id)
    }

    /// Current operating channel of an instance.
    pub fn instance_channel(&self, iface_id: ApInstanceId) -> Option<Channel> {
        self.state.lock().unwrap().instances.get(&iface_id).and_then(|inst| inst.channel)
    }

    fn validate_candidates(
        &self,
        s: &RadioState,
        config: &AcsConfig,
    ) -> Result<(ChannelBounds, Vec<u8>), AcsError> {
        let bounds = bounds::derive_bounds(config)?;
        let explicit: Option<Vec<u8>> = match &config.channel_list {
            ChannelList::Explicit(list) => {
                Some(list.iter().copied().filter(|c| *c != 0).collect())
            }
            ChannelList::Any => None,
        };
        let candidates = self.catalog.selectable_channels(
            bounds,
            explicit.as_deref(),
            &s.nol,
            s.under_assessment(),
            self.cfg.allow_restricted_channels,
        );
        if candidates.is_empty() {
            return Err(AcsError::Configuration(format!(
                "no usable candidate channels in [{}, {}]",
                bounds.start, bounds.end
            )));
        }
        Ok((bounds, candidates))
    }

    /// Admission path shared by direct requests and deferred dispatch. Either
    /// short-circuits through the DFS policy or acquires the slot and starts
    /// the scan.
    fn begin_selection_locked(
        self: &Arc<Self>,
        s: &mut RadioState,
        iface_id: ApInstanceId,
        mut config: AcsConfig,
    ) -> Result<(), AcsError> {
        let (bounds, candidates) = self.validate_candidates(s, &config)?;
        config.bounds = Some(bounds);

        match dfs::override_or_pass(s, iface_id)? {
            DfsVerdict::ChannelForced { peer, outcome } => {
                // Force-set the instance's bounds to exactly the shared
                // channel and skip the selection engine entirely.
                config.bounds =
                    Some(ChannelBounds { start: outcome.primary, end: outcome.primary });
                config.channel_list = ChannelList::Explicit(vec![outcome.primary]);
                let waiter =
                    s.instances.get_mut(&peer).and_then(|p| p.switch_in_flight.take());
                let this = Arc::clone(self);
                let _ = tokio::spawn(async move {
                    this.finish_forced(iface_id, config, outcome, waiter).await;
                });
                Ok(())
            }
            DfsVerdict::NoOverride => {
                let cbw = bounds::effective_cbw(&config, bounds);
                let pcl = self.catalog.compute_pcl(
                    self.policy.as_ref(),
                    config.hw_mode,
                    &candidates,
                );
                s.admission = Admission::Active { holder: iface_id };
                s.active = Some(ActiveSelection { iface_id, config, cbw });
                info!(
                    "{}: starting selection over {} candidates, cbw {:?}",
                    iface_id,
                    candidates.len(),
                    cbw
                );
                let this = Arc::clone(self);
                let engine = Arc::clone(&self.engine);
                s.selection_task = Some(tokio::spawn(async move {
                    match engine.start_selection(candidates, cbw, pcl).await {
                        Ok(sel) => this.on_selection_complete(iface_id, sel.primary, sel.secondary),
                        Err(e) => this.on_selection_failed(
                            iface_id,
                            AcsError::Internal(e.context("selection engine")),
                        ),
                    }
                }));
                Ok(())
            }
        }
    }

    /// Complete a DFS-forced selection: wait (bounded) for the peer's
    /// in-flight switch to confirm, then report the forced channel without
    /// ever invoking the engine.
    async fn finish_forced(
        self: Arc<Self>,
        iface_id: ApInstanceId,
        config: AcsConfig,
        outcome: SelectionOutcome,
        peer_switch: Option<ChannelSwitchWaiter>,
    ) {
        if let Some(waiter) = peer_switch {
            if waiter.wait(self.cfg.switch_timeout).await == SwitchWait::TimedOut {
                warn!("{}: peer switch confirmation timed out, aborting forced dispatch", iface_id);
                self.events.send(AcsEvent::SelectionFailed {
                    iface_id,
                    error: AcsError::AsyncTimeout("channel-switch confirmation"),
                });
                return;
            }
        }
        {
            let mut s = self.state.lock().unwrap();
            match s.instances.get_mut(&iface_id) {
                Some(inst) => {
                    inst.channel = Some(outcome.operating_channel());
                    inst.origin = Some(ChannelOrigin::Acs { config, outcome });
                }
                None => {
                    self.events.send(AcsEvent::SelectionFailed {
                        iface_id,
                        error: AcsError::Internal(format_err!(
                            "{} torn down before forced dispatch",
                            iface_id
                        )),
                    });
                    return;
                }
            }
        }
        self.events.send(AcsEvent::SelectionComplete {
            iface_id,
            outcome,
            origin: SelectionOrigin::DfsForced,
        });
    }

    fn on_selection_failed(self: &Arc<Self>, iface_id: ApInstanceId, error: AcsError) {
        let mut s = self.state.lock().unwrap();
        if matches!(s.admission, Admission::Active { holder } if holder == iface_id) {
            s.admission = Admission::Idle;
            s.active = None;
            s.selection_task = None;
        }
        warn!("{}: selection failed: {}", iface_id, error);
        self.events.send(AcsEvent::SelectionFailed { iface_id, error });
        self.drain_pending_locked(&mut s);
    }

    /// Schedule the next queued request, if any, on a cancellable timer. The
    /// settling delay lets the instance that just finished start beaconing
    /// before its channel can influence the next scan.
    fn drain_pending_locked(self: &Arc<Self>, s: &mut RadioState) {
        if !matches!(s.admission, Admission::Idle) || s.dispatch.is_some() {
            return;
        }
        let next = match s.pending.keys().next() {
            Some(id) => *id,
            None => return,
        };
        let this = Arc::clone(self);
        let delay = self.cfg.settling_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.dispatch_pending(next);
        });
        s.dispatch = Some((next, handle));
        debug!("deferred selection dispatch scheduled for {}", next);
    }

    fn dispatch_pending(self: &Arc<Self>, iface_id: ApInstanceId) {
        let mut s = self.state.lock().unwrap();
        s.dispatch = None;
        if !matches!(s.admission, Admission::Idle) {
            // Someone else took the slot meanwhile; the queue drains again on
            // the next release.
            return;
        }
        let config = match s.pending.remove(&iface_id) {
            Some(config) => config,
            None => {
                self.drain_pending_locked(&mut s);
                return;
            }
        };
        if !s.instances.contains_key(&iface_id) {
            self.drain_pending_locked(&mut s);
            return;
        }
        if let Err(error) = self.begin_selection_locked(&mut s, iface_id, config) {
            warn!("deferred selection dispatch for {} failed: {}", iface_id, error);
            self.events.send(AcsEvent::SelectionFailed { iface_id, error });
            self.drain_pending_locked(&mut s);
        }
    }
}
