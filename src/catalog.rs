// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Static channel catalog and its collaborator seams: the regulatory service
//! (valid channels, per-channel class, region restrictions), the policy
//! service (preferred channel list), and the per-radio Non-Occupancy List.

use {
    crate::{
        channel::{ChannelAvailability, MHz, RegulatoryClass},
        types::{ChannelBounds, HwModeHint},
    },
    std::collections::HashSet,
    std::sync::Arc,
};

/// One catalog row, as described by the regulatory collaborator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChannelDescriptor {
    pub number: u8,
    pub center_freq_mhz: MHz,
    pub class: RegulatoryClass,
}

/// Regulatory/channel-list service. Implementations live outside this core.
pub trait RegulatoryApi: Send + Sync {
    /// All channels of the current regulatory domain, ascending by number.
    fn valid_channels(&self) -> Vec<ChannelDescriptor>;
    fn channel_class(&self, number: u8) -> RegulatoryClass;
    /// True for region-restricted "short-range device" channels that may only
    /// be selected when explicitly allowed by configuration.
    fn is_restricted_region_channel(&self, number: u8) -> bool;
}

/// Policy/PCL service biasing selection toward less-congested channels.
pub trait PreferredChannelApi: Send + Sync {
    /// `(channel, weight)` pairs; higher weight is more preferred.
    fn preferred_channels(&self, mode: HwModeHint) -> Vec<(u8, u8)>;
}

/// Per-radio set of DFS channels barred after radar detection. Entry expiry
/// is owned by the regulatory collaborator, which inserts on radar reports
/// and removes when the non-occupancy period lapses; this core only consults
/// membership, under the radio-wide lock.
#[derive(Debug, Default)]
pub struct Nol {
    entries: HashSet<u8>,
}

impl Nol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: u8) {
        let _ = self.entries.insert(channel);
    }

    pub fn remove(&mut self, channel: u8) {
        let _ = self.entries.remove(&channel);
    }

    pub fn contains(&self, channel: u8) -> bool {
        self.entries.contains(&channel)
    }
}

/// Computed preferred-channel list for one selection, restricted to the
/// candidate set handed to the engine.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Pcl {
    entries: Vec<(u8, u8)>,
}

impl Pcl {
    pub fn weight_of(&self, channel: u8) -> Option<u8> {
        self.entries.iter().find(|(c, _)| *c == channel).map(|(_, w)| *w)
    }

    pub fn channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-side view over the regulatory collaborator, plus the availability
/// rules that combine regulatory class with NOL and pre-CAC state.
#[derive(Clone)]
pub struct ChannelCatalog {
    regulatory: Arc<dyn RegulatoryApi>,
}

impl ChannelCatalog {
    pub fn new(regulatory: Arc<dyn RegulatoryApi>) -> Self {
        Self { regulatory }
    }

    pub fn class_of(&self, number: u8) -> RegulatoryClass {
        self.regulatory.channel_class(number)
    }

    /// Availability of one channel for selection. A DFS channel is available
    /// only when absent from the NOL and not the subject of an active pre-CAC
    /// assessment; a channel under assessment is reserved for the session
    /// that is proving it.
    pub fn availability(
        &self,
        number: u8,
        nol: &Nol,
        under_assessment: Option<u8>,
    ) -> ChannelAvailability {
        if self.regulatory.channel_class(number) == RegulatoryClass::Dfs {
            if nol.contains(number) {
                return ChannelAvailability::NonOccupancy;
            }
            if under_assessment == Some(number) {
                return ChannelAvailability::UnderAssessment;
            }
        }
        ChannelAvailability::Available
    }

    /// The candidate set for a selection: catalog channels within `bounds`,
    /// intersected with an explicit list when present, minus disabled,
    /// unavailable, and (unless allowed) region-restricted channels.
    pub fn selectable_channels(
        &self,
        bounds: ChannelBounds,
        explicit: Option<&[u8]>,
        nol: &Nol,
        under_assessment: Option<u8>,
        allow_restricted: bool,
    ) -> Vec<u8> {
        self.regulatory
            .valid_channels()
            .into_iter()
            .filter(|d| d.number >= bounds.start && d.number <= bounds.end)
            .filter(|d| explicit.map(|list| list.contains(&d.number)).unwrap_or(true))
            .filter(|d| d.class != RegulatoryClass::Disabled)
            .filter(|d| allow_restricted || !self.regulatory.is_restricted_region_channel(d.number))
            .filter(|d| {
                self.availability(d.number, nol, under_assessment) == ChannelAvailability::Available
            })
            .map(|d| d.number)
            .collect()
    }

    /// First DFS channel usable as an automatic pre-CAC candidate: regulator
    /// valid, not in the NOL, and not already assigned to any instance.
    pub fn first_available_dfs_channel(&self, nol: &Nol, assigned: &HashSet<u8>) -> Option<u8> {
        self.regulatory
            .valid_channels()
            .into_iter()
            .filter(|d| d.class == RegulatoryClass::Dfs)
            .map(|d| d.number)
            .find(|number| !nol.contains(*number) && !assigned.contains(number))
    }

    /// The preferred-channel list for one selection, trimmed to `candidates`.
    pub fn compute_pcl(
        &self,
        policy: &dyn PreferredChannelApi,
        mode: HwModeHint,
        candidates: &[u8],
    ) -> Pcl {
        let entries = policy
            .preferred_channels(mode)
            .into_iter()
            .filter(|(c, _)| candidates.contains(c))
            .collect();
        Pcl { entries }
    }
}
