// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Pre-emptive clear-channel assessment (pre-CAC).
//!
//! Makes a DFS channel usable for a live 2.4 GHz AP instance by first
//! proving, on a disposable shadow instance, that no radar is present. The
//! hardware mode is reconfigured first and its completion confirmed before
//! the shadow starts beaconing; starting the shadow before the mode change
//! settles would bring it up on the wrong chain pairing. One session per
//! radio; a second request is rejected outright, not queued.

use {
    crate::{
        channel::{Channel, Cbw, RegulatoryClass, INVALID_CHAN_IDX},
        coordinator::{AcsCoordinator, RadioState},
        error::AcsError,
        phy::{AddressSlot, HardwareModeApi, InstanceLifecycleApi, ShadowConfig},
        switch::SwitchWait,
        types::{
            AcsEvent, ApInstanceId, BeaconTemplate, ChannelOrigin, EventSender, SelectionOrigin,
            SelectionOutcome,
        },
        catalog::ChannelCatalog,
        config::CoordinatorConfig,
    },
    anyhow::format_err,
    std::sync::{Arc, Mutex},
    tracing::{info, warn},
};

mod shadow;

use shadow::ShadowGuard;

/// Lifecycle of one pre-CAC session. `Idle` is represented by the absence of
/// a session record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PreCacState {
    SelectingChannel,
    CacRunning,
    Succeeded,
    /// The attempt died before the hardware-mode change ever confirmed;
    /// there was nothing to roll back.
    Failed,
    /// The attempt died after the mode change confirmed; the prior mode was
    /// restored.
    RolledBack,
}

/// Bookkeeping for the active session, kept under the radio-wide lock. The
/// shadow instance itself is owned exclusively by the workflow task.
#[derive(Debug)]
pub(crate) struct PreCacRecord {
    pub(crate) iface_id: ApInstanceId,
    pub(crate) target: u8,
    /// The real instance's channel before the attempt, retained only while
    /// the session exists; discarded on success.
    pub(crate) prior: Channel,
    pub(crate) state: PreCacState,
}

/// The shadow's bandwidth mirrors the real instance's 2.4 GHz width on the
/// 5 GHz candidate, at whichever 40 MHz secondary position is valid there.
fn mirror_bandwidth(current: Cbw, target: u8) -> Cbw {
    match current {
        Cbw::Cbw20 => Cbw::Cbw20,
        _ => {
            if Channel::new(target, Cbw::Cbw40).is_valid() {
                Cbw::Cbw40
            } else {
                Cbw::Cbw40Below
            }
        }
    }
}

/// Orchestrates pre-CAC sessions for one radio. Invoked directly by the
/// upper layer, not through the ACS coordinator, but shares the radio's
/// state lock with it.
pub struct PreCacManager {
    cfg: CoordinatorConfig,
    state: Arc<Mutex<RadioState>>,
    catalog: ChannelCatalog,
    lifecycle: Arc<dyn InstanceLifecycleApi>,
    hw_mode: Arc<dyn HardwareModeApi>,
    events: EventSender,
}

impl PreCacManager {
    pub fn new(
        coordinator: &AcsCoordinator,
        lifecycle: Arc<dyn InstanceLifecycleApi>,
        hw_mode: Arc<dyn HardwareModeApi>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cfg: coordinator.config().clone(),
            state: Arc::clone(&coordinator.state),
            catalog: coordinator.catalog.clone(),
            lifecycle,
            hw_mode,
            events: coordinator.events.clone(),
        })
    }

    /// Begin a pre-CAC attempt for `iface_id` toward `requested` (0 selects
    /// the first usable DFS channel automatically). Preconditions and
    /// resource allocation are checked synchronously; the multi-second
    /// workflow runs in a detached task and reports via `AcsEvent`.
    pub fn request_pre_cac(
        self: &Arc<Self>,
        iface_id: ApInstanceId,
        requested: u8,
    ) -> Result<(), AcsError> {
        let mut s = self.state.lock().unwrap();
        if s.precac.is_some() {
            return Err(AcsError::ConcurrencyRejected("pre-CAC already active on this radio"));
        }
        let inst = s.instances.get(&iface_id).ok_or(AcsError::NoSuchInstance(iface_id))?;
        let current = inst.channel.ok_or_else(|| {
            AcsError::Configuration(format!("{} is not beaconing", iface_id))
        })?;
        if current.is_dfs() {
            return Err(AcsError::Configuration(format!(
                "{} already operates on DFS channel {}",
                iface_id, current.primary
            )));
        }
        if !current.is_2ghz() {
            return Err(AcsError::Configuration(
                "pre-CAC applies only to instances moving from 2.4 GHz to a 5 GHz DFS channel"
                    .to_string(),
            ));
        }
        let beacon = inst.beacon.clone();

        let target = if requested == INVALID_CHAN_IDX {
            let assigned = s.assigned_channels();
            self.catalog.first_available_dfs_channel(&s.nol, &assigned).ok_or_else(|| {
                AcsError::Configuration("no DFS channel available for assessment".to_string())
            })?
        } else {
            if self.catalog.class_of(requested) != RegulatoryClass::Dfs {
                return Err(AcsError::Configuration(format!(
                    "channel {} is not a regulator-valid DFS channel",
                    requested
                )));
            }
            if s.nol.contains(requested) {
                return Err(AcsError::Configuration(format!(
                    "channel {} is in the non-occupancy list",
                    requested
                )));
            }
            requested
        };

        // Fatal before any shadow instance exists.
        let slot = s.address_pool.allocate()?;

        let shadow_channel = Channel::new(target, mirror_bandwidth(current.cbw, target));
        s.precac = Some(PreCacRecord {
            iface_id,
            target,
            prior: current,
            state: PreCacState::SelectingChannel,
        });
        info!("{}: pre-CAC admitted for channel {} (shadow {})", iface_id, target, shadow_channel);

        let this = Arc::clone(self);
        s.precac_task = Some(tokio::spawn(async move {
            this.run_session(iface_id, current, shadow_channel, beacon, slot).await;
        }));
        Ok(())
    }

    /// State of the active session, if one exists.
    pub fn session_state(&self) -> Option<PreCacState> {
        self.state.lock().unwrap().precac.as_ref().map(|record| record.state)
    }

    /// Terminal state of the most recently finished session.
    pub fn last_outcome(&self) -> Option<PreCacState> {
        self.state.lock().unwrap().precac_last
    }

    /// Abort the active session when the instance it is evaluating gets torn
    /// down. Same failure path as an internal error, never a silent no-op.
    pub fn handle_iface_removed(self: &Arc<Self>, iface_id: ApInstanceId) {
        let prior = {
            let mut s = self.state.lock().unwrap();
            match &s.precac {
                Some(record) if record.iface_id == iface_id => {}
                _ => return,
            }
            let record = s.precac.take().unwrap();
            if let Some(task) = s.precac_task.take() {
                // Dropping the aborted workflow runs the shadow guard's
                // teardown.
                task.abort();
            }
            s.precac_last = Some(PreCacState::RolledBack);
            record.prior
        };
        warn!("{} torn down during pre-CAC, aborting session", iface_id);
        let hw_mode = Arc::clone(&self.hw_mode);
        let timeout = self.cfg.switch_timeout;
        let _ = tokio::spawn(async move {
            if hw_mode.request_mode_change(prior).wait(timeout).await == SwitchWait::TimedOut {
                warn!("hardware-mode restore after aborted pre-CAC did not confirm");
            }
        });
        self.events.send(AcsEvent::SelectionFailed {
            iface_id,
            error: AcsError::Internal(format_err!("{} torn down during pre-CAC", iface_id)),
        });
    }

    async fn run_session(
        self: Arc<Self>,
        iface_id: ApInstanceId,
        prior: Channel,
        shadow_channel: Channel,
        beacon: BeaconTemplate,
        slot: AddressSlot,
    ) {
        let mut guard = ShadowGuard::new(Arc::clone(&self.lifecycle), Arc::clone(&self.state), slot);

        // Hardware mode first. The shadow must not start beaconing until the
        // chain pairing for the target band/bandwidth has settled.
        let mode_waiter = self.hw_mode.request_mode_change(shadow_channel);
        if mode_waiter.wait(self.cfg.switch_timeout).await == SwitchWait::TimedOut {
            return self
                .finish_failure(
                    iface_id,
                    prior,
                    guard,
                    false,
                    AcsError::AsyncTimeout("hardware-mode change"),
                )
                .await;
        }

        let shadow_cfg = ShadowConfig {
            ssid: beacon.shadow_ssid(&self.cfg.shadow_ssid_suffix),
            password: beacon.password.clone(),
            channel: shadow_channel,
        };
        let handle = match self.lifecycle.create_instance(&shadow_cfg) {
            Ok(handle) => {
                guard.set_handle(handle.clone());
                handle
            }
            Err(e) => {
                return self
                    .finish_failure(
                        iface_id,
                        prior,
                        guard,
                        true,
                        AcsError::Internal(e.context("creating shadow instance")),
                    )
                    .await;
            }
        };
        self.set_session_state(PreCacState::CacRunning);

        match tokio::time::timeout(self.cfg.cac_timeout, self.lifecycle.start(&handle)).await {
            Err(_) => {
                self.finish_failure(
                    iface_id,
                    prior,
                    guard,
                    true,
                    AcsError::AsyncTimeout("clear-channel assessment"),
                )
                .await
            }
            Ok(Err(e)) => {
                self.finish_failure(
                    iface_id,
                    prior,
                    guard,
                    true,
                    AcsError::Internal(e.context("shadow beacon start / CAC")),
                )
                .await
            }
            Ok(Ok(())) => {
                let outcome = SelectionOutcome::from_channel(shadow_channel);
                let instance_alive = {
                    let mut s = self.state.lock().unwrap();
                    let alive = match s.instances.get_mut(&iface_id) {
                        Some(inst) => {
                            inst.channel = Some(shadow_channel);
                            inst.origin = Some(ChannelOrigin::Explicit {
                                list: vec![shadow_channel.primary],
                                outcome,
                            });
                            true
                        }
                        None => false,
                    };
                    if alive {
                        // The saved prior channel dies with the session
                        // record.
                        s.precac = None;
                        s.precac_task = None;
                        s.precac_last = Some(PreCacState::Succeeded);
                    }
                    alive
                };
                if !instance_alive {
                    return self
                        .finish_failure(
                            iface_id,
                            prior,
                            guard,
                            true,
                            AcsError::Internal(format_err!(
                                "{} torn down during pre-CAC",
                                iface_id
                            )),
                        )
                        .await;
                }
                info!(
                    "{}: pre-CAC on channel {} clear, directing instance to move",
                    iface_id, shadow_channel.primary
                );
                self.events.send(AcsEvent::SelectionComplete {
                    iface_id,
                    outcome,
                    origin: SelectionOrigin::PreCac,
                });
                // The shadow was always disposable; tear it down on success
                // as well.
                drop(guard);
            }
        }
    }

    /// Single aggregated failure path: tear the shadow down and release its
    /// address slot (guard drop, in that order), restore the prior hardware
    /// mode when the change had confirmed, then surface one error.
    async fn finish_failure(
        &self,
        iface_id: ApInstanceId,
        prior: Channel,
        guard: ShadowGuard,
        restore_mode: bool,
        error: AcsError,
    ) {
        drop(guard);
        if restore_mode {
            if self.hw_mode.request_mode_change(prior).wait(self.cfg.switch_timeout).await
                == SwitchWait::TimedOut
            {
                warn!("hardware-mode restore after failed pre-CAC did not confirm");
            }
        }
        {
            let mut s = self.state.lock().unwrap();
            s.precac = None;
            s.precac_task = None;
            s.precac_last =
                Some(if restore_mode { PreCacState::RolledBack } else { PreCacState::Failed });
        }
        warn!("{}: pre-CAC failed: {}", iface_id, error);
        self.events.send(AcsEvent::SelectionFailed { iface_id, error });
    }

    fn set_session_state(&self, state: PreCacState) {
        if let Some(record) = self.state.lock().unwrap().precac.as_mut() {
            record.state = state;
        }
    }
}
