/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Monitor task: polls the sensor array, debounces proximity and preempts the
//! idle task for one awaken cycle per trigger.
//!
//! Per loop iteration:
//!
//! 1. `poll_all` reads every sensor once.  A sticky read fault ends the task
//!    after exactly one call to the restart primitive.
//! 2. Each reading below `threshold_mm` extends that sensor's streak; any
//!    other reading clears it.  A streak of `debounce_reads` is a trigger.
//! 3. On a trigger: suspend idle, play [`AWAKEN`] to completion, settle for
//!    [`SETTLE_DELAY`], hand the actuator back.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info};

use super::IdleLink;
use crate::array::SensorArray;
use crate::config::TriggerConfig;
use crate::error::FixtureError;
use crate::hw::{I2cBus, PwmChannel, ResetLine, Restart};
use crate::waveform::AWAKEN;

/// Pause between the end of the awaken waveform and resuming idle.
pub const SETTLE_DELAY: Duration = Duration::from_millis(20);

// ── Debounce ──────────────────────────────────────────────────────────────────

/// Per-sensor count of consecutive below-threshold reads.
#[derive(Debug, Clone)]
pub struct Debounce {
    streaks: Vec<u8>,
    required: u8,
}

impl Debounce {
    pub fn new(sensors: usize, required: u8) -> Self {
        Self {
            streaks: vec![0; sensors],
            required: required.max(1),
        }
    }

    /// Record one reading of `sensor`.  Returns `true` when its streak
    /// reaches the required length.
    pub fn observe(&mut self, sensor: usize, below_threshold: bool) -> bool {
        let Some(streak) = self.streaks.get_mut(sensor) else {
            return false;
        };
        if below_threshold {
            *streak = streak.saturating_add(1);
        } else {
            *streak = 0;
        }
        *streak >= self.required
    }

    /// Clear every streak.  Called after each trigger.
    pub fn reset(&mut self) {
        self.streaks.iter_mut().for_each(|s| *s = 0);
    }

    pub fn streak(&self, sensor: usize) -> u8 {
        self.streaks.get(sensor).copied().unwrap_or(0)
    }
}

// ── Monitor ───────────────────────────────────────────────────────────────────

pub struct Monitor<B, R, P> {
    array: SensorArray<B, R>,
    idle: IdleLink<P>,
    restart: Arc<dyn Restart>,
    threshold_mm: u16,
    debounce: Debounce,
    triggers: u64,
}

impl<B, R, P> Monitor<B, R, P>
where
    B: I2cBus,
    R: ResetLine,
    P: PwmChannel,
{
    pub fn new(
        array: SensorArray<B, R>,
        idle: IdleLink<P>,
        restart: Arc<dyn Restart>,
        trigger: &TriggerConfig,
    ) -> Self {
        let debounce = Debounce::new(array.len(), trigger.debounce_reads);
        Self {
            array,
            idle,
            restart,
            threshold_mm: trigger.threshold_mm,
            debounce,
            triggers: 0,
        }
    }

    /// Run until a fatal fault.  The restart primitive has been invoked once
    /// for the returned fault; nothing touches the bus or the actuator after.
    pub async fn run(mut self) -> FixtureError {
        debug!(sensors = self.array.len(), threshold_mm = self.threshold_mm, "monitor started");
        let fault = loop {
            if let Err(fault) = self.step().await {
                break fault;
            }
        };
        error!(error = %fault, triggers = self.triggers, "monitor fault, requesting restart");
        self.restart.restart(&fault);
        fault
    }

    /// One poll pass plus, if it triggered, one awaken cycle.
    async fn step(&mut self) -> Result<(), FixtureError> {
        let distances = self.array.poll_all().await?;
        if let Some(sensor) = self.evaluate(&distances) {
            self.triggers += 1;
            info!(
                sensor,
                distance_mm = distances[sensor],
                trigger = self.triggers,
                "proximity trigger"
            );
            self.awaken().await?;
        }
        Ok(())
    }

    /// Feed one pass into the debouncer; returns the first sensor to trigger.
    fn evaluate(&mut self, distances: &[u16]) -> Option<usize> {
        let threshold = self.threshold_mm;
        let hit = distances
            .iter()
            .enumerate()
            .find_map(|(i, &d)| self.debounce.observe(i, d < threshold).then_some(i));
        if hit.is_some() {
            self.debounce.reset();
        }
        hit
    }

    async fn awaken(&mut self) -> Result<(), FixtureError> {
        let mut actuator = self.idle.suspend().await?;
        AWAKEN.play(&mut actuator).await;
        sleep(SETTLE_DELAY).await;
        self.idle.resume(actuator).await
    }

    pub fn triggers(&self) -> u64 {
        self.triggers
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Actuator;
    use crate::config::SensorConfig;
    use crate::sim::{CountingRestart, DistanceScript, SimBus, SimDevice, SimPwm, SimReading};
    use crate::tasks::spawn_idle;
    use crate::waveform::Step;

    use SimReading::{Distance, Stall};

    #[test]
    fn single_low_read_does_not_trigger() {
        let mut d = Debounce::new(1, 2);
        assert!(!d.observe(0, true));
        assert!(!d.observe(0, false));
        assert!(!d.observe(0, true));
        assert_eq!(d.streak(0), 1);
    }

    #[test]
    fn two_consecutive_low_reads_trigger() {
        let mut d = Debounce::new(1, 2);
        assert!(!d.observe(0, true));
        assert!(d.observe(0, true));
    }

    #[test]
    fn streaks_are_per_sensor() {
        let mut d = Debounce::new(2, 2);
        assert!(!d.observe(0, true));
        assert!(!d.observe(1, true));
        assert!(!d.observe(0, false));
        assert!(d.observe(1, true));
        d.reset();
        assert_eq!(d.streak(1), 0);
        assert!(!d.observe(5, true));
    }

    #[test]
    fn zero_required_behaves_like_one() {
        let mut d = Debounce::new(1, 0);
        assert!(!d.observe(0, false));
        assert!(d.observe(0, true));
    }

    // ── Full monitor against simulated hardware ───────────────────────────────

    struct Rig {
        bus: SimBus,
        pwm: SimPwm,
        restart: Arc<CountingRestart>,
        idle: tokio::task::JoinHandle<()>,
        monitor: Monitor<SimBus, crate::sim::SimResetLine, SimPwm>,
    }

    async fn rig(devices: Vec<SimDevice>) -> Rig {
        let cfg = SensorConfig {
            count: devices.len(),
            ..Default::default()
        };
        let bus = SimBus::new(devices);
        let array = SensorArray::bring_up(bus.clone(), bus.reset_lines(), &cfg)
            .await
            .unwrap();
        let pwm = SimPwm::recording();
        let (handle, link) = spawn_idle(Actuator::new(pwm.clone(), 255));
        let restart = Arc::new(CountingRestart::new());
        let monitor = Monitor::new(array, link, restart.clone(), &TriggerConfig::default());
        Rig {
            bus,
            pwm,
            restart,
            idle: handle.join,
            monitor,
        }
    }

    fn awaken_levels() -> Vec<u16> {
        AWAKEN
            .steps()
            .filter_map(|s| match s {
                Step::Level { level, .. } => Some(level),
                Step::Hold(_) => None,
            })
            .collect()
    }

    /// Start indices of every occurrence of the full awaken sequence.
    fn awaken_blocks(duties: &[u16]) -> Vec<usize> {
        let block = awaken_levels();
        duties
            .windows(block.len())
            .enumerate()
            .filter(|(_, w)| *w == block.as_slice())
            .map(|(i, _)| i)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn awaken_is_one_contiguous_block_then_idle_restarts() {
        let r = rig(vec![SimDevice::new().with_readings([
            Distance(500),
            Distance(5),
            Distance(5),
            Distance(500),
            Stall,
        ])])
        .await;
        let pwm = r.pwm.clone();

        let fault = r.monitor.run().await;
        assert!(matches!(fault, FixtureError::ReadTimeout { sensor: 0, .. }));
        r.idle.abort();

        let samples = pwm.samples();
        let duties: Vec<u16> = samples.iter().map(|s| s.duty).collect();
        let blocks = awaken_blocks(&duties);
        assert_eq!(blocks.len(), 1);

        let start = blocks[0];
        let end = start + awaken_levels().len();
        // Idle never exceeds 120, so nothing above that lies outside the block.
        assert!(duties[..start].iter().all(|&d| d <= 120));
        assert!(duties[end..].iter().all(|&d| d <= 120));
        // Timing inside the block is the pure awaken trace.
        let gaps: Vec<u128> = samples[start..end]
            .windows(2)
            .map(|w| (w[1].at - w[0].at).as_millis())
            .collect();
        assert!(gaps.iter().all(|&g| g == 20 || g == 1_520));
        // Idle resumes from the top after the last step plus the settle delay.
        assert_eq!(duties[end..end + 2], [30u16, 31]);
        assert_eq!((samples[end].at - samples[end - 1].at).as_millis(), 20 + 20);
    }

    /// Trigger at many points of the idle cycle, ramps and holds alike.
    /// `(far_for_ms, last idle level expected before the awaken block)`.
    #[tokio::test(start_paused = true)]
    async fn awaken_stays_contiguous_at_every_idle_phase() {
        let phases: [(u64, Option<u16>); 7] = [
            (0, None),
            (1_000, None),
            (2_900, Some(120)), // inside the hold at the top
            (3_500, Some(120)),
            (4_500, None),
            (6_700, Some(30)), // inside the hold at the bottom
            (7_300, Some(30)),
        ];

        for (far_for_ms, before) in phases {
            let script = DistanceScript {
                segments: vec![
                    (900, Duration::from_millis(far_for_ms)),
                    (4, Duration::from_millis(120)),
                    (900, Duration::from_secs(60)),
                ],
            };
            let r = rig(vec![SimDevice::new()
                .with_script(script)
                .with_stall_after(Duration::from_millis(far_for_ms + 12_000))])
            .await;
            let pwm = r.pwm.clone();

            r.monitor.run().await;
            r.idle.abort();

            let samples = pwm.samples();
            let duties: Vec<u16> = samples.iter().map(|s| s.duty).collect();
            let blocks = awaken_blocks(&duties);
            assert_eq!(blocks.len(), 1, "phase {far_for_ms}ms");

            let start = blocks[0];
            let end = start + awaken_levels().len();
            assert!(start > 0, "phase {far_for_ms}ms: idle never ran");
            assert!(duties[..start].iter().all(|&d| d <= 120), "phase {far_for_ms}ms");
            assert!(duties[end..].iter().all(|&d| d <= 120), "phase {far_for_ms}ms");
            if let Some(level) = before {
                assert_eq!(duties[start - 1], level, "phase {far_for_ms}ms");
            }

            let gaps: Vec<u128> = samples[start..end]
                .windows(2)
                .map(|w| (w[1].at - w[0].at).as_millis())
                .collect();
            assert!(
                gaps.iter().all(|&g| g == 20 || g == 1_520),
                "phase {far_for_ms}ms: {gaps:?}"
            );
            assert_eq!(duties[end..end + 2], [30u16, 31], "phase {far_for_ms}ms");
            assert_eq!((samples[end].at - samples[end - 1].at).as_millis(), 40);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_low_read_leaves_idle_alone() {
        let r = rig(vec![SimDevice::new().with_readings([
            Distance(5),
            Distance(500),
            Distance(5),
            Distance(500),
            Stall,
        ])])
        .await;
        let pwm = r.pwm.clone();

        r.monitor.run().await;
        r.idle.abort();

        assert!(pwm.duties().iter().all(|&d| d <= 120));
    }

    #[tokio::test(start_paused = true)]
    async fn every_trigger_plays_awaken_once() {
        let r = rig(vec![
            SimDevice::new().with_readings([
                Distance(5),
                Distance(900),
                Distance(900),
                Distance(5),
                Distance(5),
                Stall,
            ]),
            SimDevice::new().with_readings([
                Distance(900),
                Distance(3),
                Distance(3),
                Distance(900),
                Distance(900),
            ]),
        ])
        .await;
        let pwm = r.pwm.clone();
        let mut monitor = r.monitor;

        let mut fault = None;
        while fault.is_none() {
            if let Err(e) = monitor.step().await {
                fault = Some(e);
            }
        }
        assert_eq!(monitor.triggers(), 2);
        r.idle.abort();

        let duties = pwm.duties();
        assert_eq!(awaken_blocks(&duties).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn read_fault_restarts_once_and_goes_quiet() {
        let r = rig(vec![
            SimDevice::new(),
            SimDevice::new().with_readings([Distance(700), Stall]),
        ])
        .await;
        let bus = r.bus.clone();
        let restart = r.restart.clone();

        let fault = r.monitor.run().await;

        assert_eq!(
            fault,
            FixtureError::ReadTimeout {
                sensor: 1,
                address: 0x2B,
                timeout_ms: 500
            }
        );
        assert_eq!(restart.count(), 1);
        assert_eq!(restart.causes(), vec![fault]);

        let transactions = bus.transactions();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(bus.transactions(), transactions);
        assert_eq!(restart.count(), 1);
        r.idle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn lost_idle_task_is_fatal() {
        let r = rig(vec![SimDevice::new().with_readings([Distance(5), Distance(5)])]).await;
        r.idle.abort();
        let _ = r.idle.await;

        let fault = r.monitor.run().await;
        assert_eq!(fault, FixtureError::IdleTaskGone);
        assert_eq!(r.restart.count(), 1);
    }
}
