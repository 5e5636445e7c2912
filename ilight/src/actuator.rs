/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Actuator controller: the single brightness output of the fixture.
//!
//! There is exactly one [`Actuator`] per fixture and it is not `Clone`.
//! Whoever holds the value is the only writer; the idle and monitor tasks
//! move it back and forth through the preemption handshake in
//! [`tasks`](crate::tasks) instead of sharing it behind a lock.

use tracing::trace;

use crate::hw::PwmChannel;

pub struct Actuator<P> {
    pwm: P,
    max: u16,
    level: u16,
}

impl<P: PwmChannel> Actuator<P> {
    /// Wrap a configured PWM channel whose highest duty value is `max`.
    pub fn new(pwm: P, max: u16) -> Self {
        Self { pwm, max, level: 0 }
    }

    /// Clamp `level` to `[0, max]` and apply it to the output immediately.
    pub fn set_level(&mut self, level: u16) {
        let level = level.min(self.max);
        self.pwm.set_duty(level);
        self.level = level;
        trace!(level, "actuator level");
    }
}

impl<P> Actuator<P> {
    /// Last level applied.
    pub fn level(&self) -> u16 {
        self.level
    }

    pub fn max(&self) -> u16 {
        self.max
    }
}

impl<P> std::fmt::Debug for Actuator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actuator")
            .field("level", &self.level)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}
