//! Responsive depth policy — how deep replies nest on the current device.
//!
//! DESIGN
//! ======
//! Two independent boolean device signals (`is_mobile_small`, `is_mobile`)
//! are combined latest-wins: each handler writes its half of a shared
//! last-known pair and recomputes the depth from the whole pair. Nothing
//! waits for both signals; an unset signal reads as `false`, so a fresh
//! policy publishes the desktop depth immediately.
//!
//! Consecutive identical depths are published as-is.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::replay::{ReplayChannel, Subscription};

#[cfg(test)]
#[path = "depth_test.rs"]
mod tests;

pub const DEPTH_MOBILE_SMALL: u8 = 1;
pub const DEPTH_MOBILE: u8 = 2;
pub const DEPTH_DESKTOP: u8 = 4;

/// Viewports narrower than this many CSS pixels are small mobile.
pub const MOBILE_SMALL_MAX_WIDTH: u32 = 576;
/// Viewports narrower than this many CSS pixels are mobile.
pub const MOBILE_MAX_WIDTH: u32 = 768;

/// Maximum reply nesting depth for a device class. Small mobile wins.
#[must_use]
pub const fn depth_for(is_mobile_small: bool, is_mobile: bool) -> u8 {
    if is_mobile_small {
        return DEPTH_MOBILE_SMALL;
    }
    if is_mobile {
        return DEPTH_MOBILE;
    }
    DEPTH_DESKTOP
}

// =============================================================================
// VIEWPORT
// =============================================================================

/// Viewport width in CSS pixels, the source of both device signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
}

impl Viewport {
    #[must_use]
    pub const fn is_mobile_small(self) -> bool {
        self.width < MOBILE_SMALL_MAX_WIDTH
    }

    #[must_use]
    pub const fn is_mobile(self) -> bool {
        self.width < MOBILE_MAX_WIDTH
    }

    #[must_use]
    pub const fn depth(self) -> u8 {
        depth_for(self.is_mobile_small(), self.is_mobile())
    }
}

// =============================================================================
// POLICY
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct DeviceSignals {
    is_mobile_small: bool,
    is_mobile: bool,
}

/// Publishes a fresh depth on every device-signal write.
pub struct ResponsiveDepthPolicy {
    signals: Mutex<DeviceSignals>,
    depth: ReplayChannel<u8>,
}

impl ResponsiveDepthPolicy {
    #[must_use]
    pub fn new() -> Self {
        let policy = Self { signals: Mutex::new(DeviceSignals::default()), depth: ReplayChannel::new() };
        policy.depth.publish(DEPTH_DESKTOP);
        policy
    }

    /// Depth stream. Replays the current depth on subscription; a reader
    /// that falls behind sees only the newest depth.
    pub fn subscribe(&self) -> Subscription<u8> {
        self.depth.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> u8 {
        self.depth.latest().unwrap_or(DEPTH_DESKTOP)
    }

    pub fn set_mobile_small(&self, value: bool) {
        self.update(|s| s.is_mobile_small = value);
    }

    pub fn set_mobile(&self, value: bool) {
        self.update(|s| s.is_mobile = value);
    }

    /// Write both signals from a viewport in one step.
    pub fn set_viewport(&self, viewport: Viewport) {
        self.update(|s| {
            s.is_mobile_small = viewport.is_mobile_small();
            s.is_mobile = viewport.is_mobile();
        });
    }

    fn update(&self, write: impl FnOnce(&mut DeviceSignals)) {
        // Lock held across publish so concurrent writers publish in write order.
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        write(&mut signals);
        let depth = depth_for(signals.is_mobile_small, signals.is_mobile);
        debug!(is_mobile_small = signals.is_mobile_small, is_mobile = signals.is_mobile, depth, "depth recomputed");
        self.depth.publish(depth);
    }

    /// Drive the policy from two external signal streams.
    ///
    /// The current value of each signal is applied first. The task ends
    /// when both senders are gone; abort the handle to detach earlier.
    pub fn attach(
        self: &Arc<Self>,
        mut is_mobile_small: watch::Receiver<bool>,
        mut is_mobile: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let policy = Arc::clone(self);
        tokio::spawn(async move {
            let small = *is_mobile_small.borrow_and_update();
            let mobile = *is_mobile.borrow_and_update();
            policy.update(|s| {
                s.is_mobile_small = small;
                s.is_mobile = mobile;
            });

            let mut small_open = true;
            let mut mobile_open = true;
            while small_open || mobile_open {
                tokio::select! {
                    changed = is_mobile_small.changed(), if small_open => match changed {
                        Ok(()) => {
                            let value = *is_mobile_small.borrow_and_update();
                            policy.set_mobile_small(value);
                        }
                        Err(_) => small_open = false,
                    },
                    changed = is_mobile.changed(), if mobile_open => match changed {
                        Ok(()) => {
                            let value = *is_mobile.borrow_and_update();
                            policy.set_mobile(value);
                        }
                        Err(_) => mobile_open = false,
                    },
                }
            }
            debug!("device signals closed; depth policy detached");
        })
    }
}

impl Default for ResponsiveDepthPolicy {
    fn default() -> Self {
        Self::new()
    }
}
