// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Bounded-wait synchronization for asynchronous channel/bandwidth changes.
//!
//! A waiter is single-use and bound to one switch request. The switching
//! side signals completion exactly once; a signal arriving after the waiter
//! has timed out lands on a dropped receiver and is discarded, so late
//! completions can never deadlock anyone.

use {futures::channel::oneshot, std::time::Duration, tracing::debug};

#[derive(Debug, Eq, PartialEq)]
pub enum SwitchWait {
    Completed,
    TimedOut,
}

/// Completion side of a switch. Consumed by signaling.
#[derive(Debug)]
pub struct ChannelSwitchSignal {
    sender: oneshot::Sender<()>,
}

impl ChannelSwitchSignal {
    pub fn signal(self) {
        if self.sender.send(()).is_err() {
            // The waiter already moved on (timed out or was dropped).
            debug!("channel-switch completion arrived after the waiter gave up");
        }
    }
}

/// Waiting side of a switch. Consumed by waiting.
#[derive(Debug)]
pub struct ChannelSwitchWaiter {
    receiver: oneshot::Receiver<()>,
}

impl ChannelSwitchWaiter {
    pub fn pair() -> (ChannelSwitchSignal, ChannelSwitchWaiter) {
        let (sender, receiver) = oneshot::channel();
        (ChannelSwitchSignal { sender }, ChannelSwitchWaiter { receiver })
    }

    /// Wait for the switch to complete, at most `timeout`. `TimedOut` must be
    /// treated by callers as a hard failure of the enclosing operation.
    pub async fn wait(self, timeout: Duration) -> SwitchWait {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(())) => SwitchWait::Completed,
            // Sender dropped without signaling: the switch request died, which
            // is indistinguishable from never completing.
            Ok(Err(_)) => SwitchWait::TimedOut,
            Err(_) => SwitchWait::TimedOut,
        }
    }
}
