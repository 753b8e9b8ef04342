// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Error taxonomy for the channel-coordination core. Configuration and
//! concurrency rejections are surfaced synchronously to the caller; nothing
//! in this crate retries internally.

use {crate::types::ApInstanceId, thiserror::Error};

#[derive(Debug, Error)]
pub enum AcsError {
    /// Malformed or unusable configuration: empty candidate set after
    /// filtering, malformed explicit channel list, or a forced channel that
    /// the already-beaconing instance never validated.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The radio cannot admit the request right now (e.g. a pre-CAC session
    /// is already active). Not queued; the caller owns retry policy.
    #[error("rejected for concurrency: {0}")]
    ConcurrencyRejected(&'static str),

    /// A bounded wait on an asynchronous completion signal elapsed. Fatal to
    /// the enclosing operation.
    #[error("timed out waiting for {0}")]
    AsyncTimeout(&'static str),

    /// A shared resource (interface address slot) could not be allocated.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(&'static str),

    /// The calling instance already holds the admission slot.
    #[error("selection already in progress for {0}")]
    SelectionInProgress(ApInstanceId),

    #[error("no such AP instance: {0}")]
    NoSuchInstance(ApInstanceId),

    /// Collaborator failure or mid-flight teardown.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
