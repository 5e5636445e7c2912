/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! iLight – fixture runtime core
//!
//! Breathes a light slowly while nobody is near and plays a brighter awaken
//! waveform when a time-of-flight sensor sees someone close.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/     – YAML fixture configuration + validation
//! ├── error       – bus / bring-up / fixture fault types
//! ├── hw          – board collaborator traits (bus, reset line, PWM, restart)
//! ├── sensor/     – VL53L1X driver adapter + register map
//! ├── array       – multi-sensor bring-up and polling
//! ├── actuator    – single-owner brightness output
//! ├── waveform    – idle and awaken waveforms
//! ├── tasks/      – idle task, monitor task, preemption handshake
//! ├── fixture     – orchestration of one boot
//! └── sim/        – simulated hardware for the host binary and tests
//! ```

pub mod actuator;
pub mod array;
pub mod config;
pub mod error;
pub mod fixture;
pub mod hw;
pub mod sensor;
pub mod sim;
pub mod tasks;
pub mod waveform;
