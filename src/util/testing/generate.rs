// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
#![cfg(test)]

use {
    crate::types::BeaconTemplate,
    rand::{distributions::Alphanumeric, Rng},
};

pub fn generate_ssid(prefix: &str) -> String {
    let tail: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(6).map(char::from).collect();
    format!("{}-{}", prefix, tail)
}

pub fn generate_beacon(id: u16) -> BeaconTemplate {
    let mut rng = rand::thread_rng();
    let password: Vec<u8> = (0..8).map(|_| rng.gen_range(0x20..0x7f)).collect();
    BeaconTemplate::new(generate_ssid(&format!("net-{}", id)), password)
}
