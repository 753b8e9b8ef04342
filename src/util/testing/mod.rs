// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
#![cfg(test)]

pub mod fakes;
pub mod generate;

pub use generate::*;

/// Asserts that an expression matches a pattern, optionally evaluating a
/// block with the pattern's bindings.
macro_rules! assert_variant {
    ($expression:expr, $pattern:pat $(if $guard:expr)? $(,)?) => {
        match $expression {
            $pattern $(if $guard)? => {}
            other => panic!("unexpected variant: {:?}", other),
        }
    };
    ($expression:expr, $pattern:pat $(if $guard:expr)? => $block:expr $(,)?) => {
        match $expression {
            $pattern $(if $guard)? => $block,
            other => panic!("unexpected variant: {:?}", other),
        }
    };
}
pub(crate) use assert_variant;

/// Let spawned tasks make progress on the current-thread test runtime until
/// everything runnable has run.
pub async fn run_until_idle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
