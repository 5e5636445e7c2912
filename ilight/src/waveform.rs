/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The two light waveforms.
//!
//! A [`Waveform`] is a fixed list of segments (ramps and holds) that expands
//! into a deterministic sequence of [`Step`]s.  It has no position state, so
//! every playback starts from the first step.
//!
//! | Waveform | Profile | Level steps | Cycle |
//! |---|---|---|---|
//! | [`IDLE`] | 30→120 @30ms, hold 1000ms, 120→30 @30ms, hold 1000ms | 91 + 91 | 7460ms |
//! | [`AWAKEN`] | 30→255 @20ms, hold 1500ms, 255→30 @20ms | 226 + 226 | 10540ms |

use std::time::Duration;

use tokio::time::sleep;

use crate::actuator::Actuator;
use crate::hw::PwmChannel;

// ── Definitions ───────────────────────────────────────────────────────────────

/// Slow breathing while nobody is around.
pub const IDLE: Waveform = Waveform {
    name: "idle",
    segments: &[
        Segment::Ramp {
            from: 30,
            to: 120,
            step: Duration::from_millis(30),
        },
        Segment::Hold(Duration::from_millis(1_000)),
        Segment::Ramp {
            from: 120,
            to: 30,
            step: Duration::from_millis(30),
        },
        Segment::Hold(Duration::from_millis(1_000)),
    ],
};

/// Full-brightness swell after a proximity trigger.
pub const AWAKEN: Waveform = Waveform {
    name: "awaken",
    segments: &[
        Segment::Ramp {
            from: 30,
            to: 255,
            step: Duration::from_millis(20),
        },
        Segment::Hold(Duration::from_millis(1_500)),
        Segment::Ramp {
            from: 255,
            to: 30,
            step: Duration::from_millis(20),
        },
    ],
};

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Unit steps from `from` to `to`, both inclusive, `step` apart.
    Ramp { from: u16, to: u16, step: Duration },
    /// Keep the current level.
    Hold(Duration),
}

/// One unit of playback: optionally set a level, then wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Level { level: u16, hold: Duration },
    Hold(Duration),
}

impl Step {
    pub fn hold(&self) -> Duration {
        match *self {
            Step::Level { hold, .. } | Step::Hold(hold) => hold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waveform {
    pub name: &'static str,
    pub segments: &'static [Segment],
}

impl Waveform {
    /// The full step sequence, from the top.
    pub fn steps(self) -> impl Iterator<Item = Step> + Send + 'static {
        self.segments.iter().flat_map(|seg| segment_steps(*seg))
    }

    /// Nominal length of one cycle.
    pub fn duration(self) -> Duration {
        self.steps().map(|s| s.hold()).sum()
    }

    /// Number of steps that set a level.
    pub fn level_steps(self) -> usize {
        self.steps()
            .filter(|s| matches!(s, Step::Level { .. }))
            .count()
    }

    /// Run one full cycle.  Every step is applied, no early exit.
    ///
    /// The caller must be the actuator's current owner, which holding
    /// `&mut Actuator` already proves.
    pub async fn play<P: PwmChannel>(&self, actuator: &mut Actuator<P>) {
        for step in self.steps() {
            if let Step::Level { level, .. } = step {
                actuator.set_level(level);
            }
            sleep(step.hold()).await;
        }
    }
}

fn segment_steps(seg: Segment) -> Box<dyn Iterator<Item = Step> + Send> {
    match seg {
        Segment::Ramp { from, to, step } => {
            let levels: Box<dyn Iterator<Item = u16> + Send> = if from <= to {
                Box::new(from..=to)
            } else {
                Box::new((to..=from).rev())
            };
            Box::new(levels.map(move |level| Step::Level { level, hold: step }))
        }
        Segment::Hold(d) => Box::new(std::iter::once(Step::Hold(d))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
