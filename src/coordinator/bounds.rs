// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Channel-range and effective-bandwidth derivation for a selection request.

use {
    crate::{
        channel::{Cbw, INVALID_CHAN_IDX},
        error::AcsError,
        types::{AcsConfig, ChannelBounds, ChannelList, HwModeHint},
    },
    tracing::debug,
};

/// Inclusive channel bounds for the request: from the explicit list when one
/// was supplied (zero entries are sentinels), else from the hardware-mode
/// hint.
pub fn derive_bounds(config: &AcsConfig) -> Result<ChannelBounds, AcsError> {
    match &config.channel_list {
        ChannelList::Explicit(list) => {
            let usable: Vec<u8> =
                list.iter().copied().filter(|c| *c != INVALID_CHAN_IDX).collect();
            let start = usable.iter().copied().min();
            let end = usable.iter().copied().max();
            match (start, end) {
                (Some(start), Some(end)) => Ok(ChannelBounds { start, end }),
                _ => Err(AcsError::Configuration(
                    "explicit channel list has no usable entries".to_string(),
                )),
            }
        }
        ChannelList::Any => {
            let (start, end) = match config.hw_mode {
                HwModeHint::LegacyB => (1, 14),
                HwModeHint::LegacyG => (1, 13),
                HwModeHint::LegacyA => (36, 165),
                HwModeHint::Any => (1, 165),
            };
            Ok(ChannelBounds { start, end })
        }
    }
}

/// The bandwidth actually handed to the selection engine. HT off forces
/// 20 MHz; VHT-only widths without VHT fall back to 40 MHz; and any VHT-only
/// width is silently downgraded to 40 MHz when the end channel is at or
/// below 14, where no such channelization exists.
pub fn effective_cbw(config: &AcsConfig, bounds: ChannelBounds) -> Cbw {
    if !config.ht_enabled {
        return Cbw::Cbw20;
    }
    let mut cbw = config.cbw;
    if !config.vht_enabled && cbw.is_vht_only() {
        cbw = Cbw::Cbw40;
    }
    if bounds.end <= 14 && cbw.is_vht_only() {
        debug!("downgrading {:?} to 40 MHz for 2.4 GHz-only bounds", cbw);
        cbw = Cbw::Cbw40;
    }
    cbw
}
