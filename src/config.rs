// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Tunables for the coordination core. Defaults mirror the driver's fixed
//! values; embedders override per product.

use std::time::Duration;

/// Delay between a completed selection and dispatch of a queued request, so
/// the instance that just finished can start beaconing before the next scan.
pub const DEFAULT_SETTLING_DELAY: Duration = Duration::from_millis(500);

/// Bound on waiting for a channel-switch / hardware-mode completion signal.
pub const DEFAULT_SWITCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the shadow instance's beacon start plus the regulatory CAC
/// listening period (60 s for non-weather channels, plus margin).
pub const DEFAULT_CAC_TIMEOUT: Duration = Duration::from_secs(70);

/// Driver-imposed cap on concurrently existing AP instances, shadow included.
pub const DEFAULT_MAX_INSTANCES: usize = 4;

/// Suffix appended to the real instance's SSID for the shadow network name.
pub const DEFAULT_SHADOW_SSID_SUFFIX: &str = "-cac";

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Permit region-restricted ("short-range device") channels as selection
    /// candidates.
    pub allow_restricted_channels: bool,
    pub settling_delay: Duration,
    pub switch_timeout: Duration,
    pub cac_timeout: Duration,
    pub max_instances: usize,
    pub shadow_ssid_suffix: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            allow_restricted_channels: false,
            settling_delay: DEFAULT_SETTLING_DELAY,
            switch_timeout: DEFAULT_SWITCH_TIMEOUT,
            cac_timeout: DEFAULT_CAC_TIMEOUT,
            max_instances: DEFAULT_MAX_INSTANCES,
            shadow_ssid_suffix: DEFAULT_SHADOW_SSID_SUFFIX.to_string(),
        }
    }
}
