// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Shared value types for the coordinator, DFS policy, and pre-CAC workflow.

use {
    crate::{
        channel::{Channel, Cbw, INVALID_CHAN_IDX},
        error::AcsError,
        switch::ChannelSwitchWaiter,
    },
    futures::channel::mpsc,
    std::fmt,
    tracing::warn,
};

/// Identifier of one beaconing AP instance (primary AP or a P2P group owner
/// acting as one) on the radio.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ApInstanceId(pub u16);

impl fmt::Display for ApInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iface {}", self.0)
    }
}

/// Hardware-mode hint supplied with a selection request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HwModeHint {
    LegacyB,
    LegacyG,
    LegacyA,
    Any,
}

/// Candidate channels for a selection: everything the catalog offers, or an
/// explicit per-instance list. Zero entries in an explicit list are padding
/// sentinels and ignored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelList {
    Any,
    Explicit(Vec<u8>),
}

/// Inclusive [start, end] channel-number bounds derived for a selection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChannelBounds {
    pub start: u8,
    pub end: u8,
}

/// Per-instance parameters of a pending or active selection. Owned by its AP
/// instance; mutated only while that instance holds the admission slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AcsConfig {
    pub hw_mode: HwModeHint,
    pub ht_enabled: bool,
    pub vht_enabled: bool,
    pub cbw: Cbw,
    pub channel_list: ChannelList,
    /// Computed by the coordinator at admission time.
    pub bounds: Option<ChannelBounds>,
}

impl AcsConfig {
    pub fn new(hw_mode: HwModeHint, ht_enabled: bool, vht_enabled: bool, cbw: Cbw) -> Self {
        Self { hw_mode, ht_enabled, vht_enabled, cbw, channel_list: ChannelList::Any, bounds: None }
    }

    pub fn with_channel_list(mut self, list: Vec<u8>) -> Self {
        self.channel_list = ChannelList::Explicit(list);
        self
    }
}

/// The result of a completed selection, as reported to the upper layer:
/// primary channel, secondary channel (0 if none), the two VHT segment
/// center channels (0 if not applicable), and the effective bandwidth.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SelectionOutcome {
    pub primary: u8,
    pub secondary: u8,
    pub vht_seg0: u8,
    pub vht_seg1: u8,
    pub cbw: Cbw,
}

impl SelectionOutcome {
    /// Derive the full payload from an operating channel.
    pub fn from_channel(chan: Channel) -> Self {
        let (vht_seg0, vht_seg1) = chan.vht_segments();
        Self {
            primary: chan.primary,
            secondary: chan.secondary_channel(),
            vht_seg0,
            vht_seg1,
            cbw: chan.cbw,
        }
    }

    /// Derive the payload from a scan result, trusting the engine's secondary
    /// channel and deriving the VHT segment centers locally.
    pub fn from_scan(primary: u8, secondary: u8, cbw: Cbw) -> Self {
        let (vht_seg0, vht_seg1) = Channel::new(primary, cbw).vht_segments();
        Self { primary, secondary, vht_seg0, vht_seg1, cbw }
    }

    pub fn operating_channel(&self) -> Channel {
        Channel::new(self.primary, self.cbw)
    }

    /// A pair is internally consistent when its primary is a real channel and
    /// the secondary is either unset or the primary's derived partner.
    pub fn is_consistent(&self) -> bool {
        self.primary != INVALID_CHAN_IDX
            && (self.secondary == INVALID_CHAN_IDX
                || self.secondary == self.operating_channel().secondary_channel())
    }
}

/// How an AP instance arrived at its current channel. Consulted by the DFS
/// concurrency policy when forcing a second instance onto the same channel.
#[derive(Clone, Debug)]
pub enum ChannelOrigin {
    /// The instance ran (or was forced through) ACS; the derived config and
    /// outcome are copied verbatim onto a co-located instance.
    Acs { config: AcsConfig, outcome: SelectionOutcome },
    /// The channel came from an explicit per-instance list.
    Explicit { list: Vec<u8>, outcome: SelectionOutcome },
}

impl ChannelOrigin {
    pub fn outcome(&self) -> &SelectionOutcome {
        match self {
            ChannelOrigin::Acs { outcome, .. } => outcome,
            ChannelOrigin::Explicit { outcome, .. } => outcome,
        }
    }
}

/// Beacon parameters copied onto the pre-CAC shadow instance so it broadcasts
/// a structurally valid network. An empty password means an open network.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BeaconTemplate {
    pub ssid: String,
    pub password: Vec<u8>,
}

impl BeaconTemplate {
    pub fn new(ssid: impl Into<String>, password: Vec<u8>) -> Self {
        Self { ssid: ssid.into(), password }
    }

    /// The derived, differently-named SSID used by a shadow instance.
    pub fn shadow_ssid(&self, suffix: &str) -> String {
        format!("{}{}", self.ssid, suffix)
    }
}

/// One beaconing entity on the radio. Created when the upper layer brings the
/// interface up, destroyed on teardown. Admission flags (`acs_in_progress`,
/// `acs_pending`) live in the coordinator's tagged state, not here.
#[derive(Debug)]
pub struct ApInstance {
    pub id: ApInstanceId,
    pub beacon: BeaconTemplate,
    /// Current operating channel; `None` until the instance first beacons.
    pub channel: Option<Channel>,
    pub origin: Option<ChannelOrigin>,
    /// Completion waiter for an in-flight channel/bandwidth change, consumed
    /// by whoever needs the confirmed channel before proceeding.
    pub switch_in_flight: Option<ChannelSwitchWaiter>,
}

impl ApInstance {
    pub fn new(id: ApInstanceId, beacon: BeaconTemplate) -> Self {
        Self { id, beacon, channel: None, origin: None, switch_in_flight: None }
    }

    pub fn is_beaconing(&self) -> bool {
        self.channel.is_some()
    }

    pub fn is_dfs_beaconing(&self) -> bool {
        self.channel.map(|c| c.is_dfs()).unwrap_or(false)
    }
}

/// Where a completed selection came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectionOrigin {
    Scan,
    DfsForced,
    PreCac,
}

/// Outbound notifications to the upper layer. `SelectionComplete` is the only
/// externally-visible contract of this core; `SelectionFailed` surfaces
/// asynchronous failures of spawned work.
#[derive(Debug)]
pub enum AcsEvent {
    SelectionComplete { iface_id: ApInstanceId, outcome: SelectionOutcome, origin: SelectionOrigin },
    SelectionFailed { iface_id: ApInstanceId, error: AcsError },
}

/// Cloneable sender for `AcsEvent`s. A closed receiver is logged and
/// otherwise ignored; event delivery is best-effort by design of the
/// notification contract.
#[derive(Clone)]
pub struct EventSender {
    sender: mpsc::UnboundedSender<AcsEvent>,
}

impl EventSender {
    pub fn new(sender: mpsc::UnboundedSender<AcsEvent>) -> Self {
        Self { sender }
    }

    pub fn send(&self, event: AcsEvent) {
        if let Err(e) = self.sender.unbounded_send(event) {
            warn!("Failed to send ACS event, receiver dropped: {:?}", e);
        }
    }
}
