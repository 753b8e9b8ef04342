// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! DFS same-channel-concurrency policy.
//!
//! One radio chain performs the mandatory channel-availability check per
//! channel, so two concurrently-beaconing instances must never pick DFS
//! channels independently. When a new instance is about to select while a
//! DFS-beaconing instance exists, the new one is forced onto that channel
//! and skips its own selection entirely.

use {
    crate::{
        coordinator::RadioState,
        error::AcsError,
        types::{ApInstanceId, ChannelList, ChannelOrigin, SelectionOutcome},
    },
    tracing::info,
};

#[derive(Debug)]
pub enum DfsVerdict {
    NoOverride,
    /// Force the new instance onto the beaconing peer's channel. `outcome`
    /// is the full payload to report in place of a scan result.
    ChannelForced { peer: ApInstanceId, outcome: SelectionOutcome },
}

/// Evaluate the policy for `new_iface`. Lowest-id DFS-beaconing peer wins
/// when several exist (they all share one channel by this very policy).
pub(crate) fn override_or_pass(
    state: &RadioState,
    new_iface: ApInstanceId,
) -> Result<DfsVerdict, AcsError> {
    let mut peers: Vec<_> = state
        .instances
        .values()
        .filter(|inst| inst.id != new_iface && inst.is_dfs_beaconing())
        .collect();
    peers.sort_by_key(|inst| inst.id);

    let peer = match peers.first() {
        Some(peer) => peer,
        // No DFS-beaconing instance exists; non-DFS peers impose no
        // constraint.
        None => return Ok(DfsVerdict::NoOverride),
    };
    let chan = match peer.channel {
        Some(chan) => chan,
        None => return Ok(DfsVerdict::NoOverride),
    };

    let outcome = match &peer.origin {
        // The peer ran ACS itself: copy its entire derived configuration
        // verbatim rather than re-deriving, after checking it is still
        // internally consistent.
        Some(ChannelOrigin::Acs { config, outcome }) => {
            if !outcome.is_consistent() || outcome.primary != chan.primary {
                return Err(AcsError::Configuration(format!(
                    "{} holds an inconsistent ACS-derived configuration; refusing to copy it onto {}",
                    peer.id, new_iface
                )));
            }
            if let ChannelList::Explicit(list) = &config.channel_list {
                if !list.contains(&outcome.primary) {
                    return Err(AcsError::Configuration(format!(
                        "{}'s ACS config no longer lists its own channel {}",
                        peer.id, outcome.primary
                    )));
                }
            }
            *outcome
        }
        // The peer's channel came from an explicit list. The forced channel
        // must be one the peer actually validated (its derived
        // primary/secondary pair); anything else is a configuration error.
        Some(ChannelOrigin::Explicit { outcome, .. }) => {
            if chan.primary != outcome.primary && chan.primary != outcome.secondary {
                return Err(AcsError::Configuration(format!(
                    "channel {} was never validated by {}'s explicit configuration",
                    chan.primary, peer.id
                )));
            }
            SelectionOutcome::from_channel(chan)
        }
        None => SelectionOutcome::from_channel(chan),
    };

    info!("{} forced onto DFS channel {} shared with {}", new_iface, outcome.primary, peer.id);
    Ok(DfsVerdict::ChannelForced { peer: peer.id, outcome })
}

/// Radar was detected on `channel`: bar it until the regulatory collaborator
/// reports the non-occupancy period over.
pub(crate) fn record_radar(state: &mut RadioState, channel: u8) {
    info!("radar detected on channel {}, adding to non-occupancy list", channel);
    state.nol.insert(channel);
}

/// The non-occupancy period for `channel` lapsed.
pub(crate) fn clear_non_occupancy(state: &mut RadioState, channel: u8) {
    state.nol.remove(channel);
}
