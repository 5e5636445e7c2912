/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! VL53L1X register map (the subset the fixture uses) and wire helpers.
//!
//! Every register is addressed by a 16-bit big-endian index sent ahead of the
//! data bytes; multi-byte values are big-endian as well.

pub const I2C_SLAVE_DEVICE_ADDRESS: u16 = 0x0001;
pub const GPIO_TIO_HV_STATUS: u16 = 0x0031;
pub const SYSTEM_INTERMEASUREMENT_PERIOD: u16 = 0x006C;
pub const ROI_CONFIG_USER_ROI_CENTRE_SPAD: u16 = 0x007F;
pub const ROI_CONFIG_USER_ROI_REQUESTED_GLOBAL_XY_SIZE: u16 = 0x0080;
pub const SYSTEM_INTERRUPT_CLEAR: u16 = 0x0086;
pub const SYSTEM_MODE_START: u16 = 0x0087;
pub const RESULT_FINAL_CROSSTALK_CORRECTED_RANGE_MM_SD0: u16 = 0x0096;
pub const RESULT_OSC_CALIBRATE_VAL: u16 = 0x00DE;
pub const FIRMWARE_SYSTEM_STATUS: u16 = 0x00E5;
pub const IDENTIFICATION_MODEL_ID: u16 = 0x010F;

/// Value of [`IDENTIFICATION_MODEL_ID`] on a genuine VL53L1X.
pub const MODEL_ID: u16 = 0xEACC;

/// [`SYSTEM_MODE_START`] value for back-to-back timed ranging.
pub const MODE_START_TIMED: u8 = 0x40;

/// Encode a register write: index followed by `data`.
pub fn frame(reg: u16, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + data.len());
    buf.extend_from_slice(&reg.to_be_bytes());
    buf.extend_from_slice(data);
    buf
}

/// Encode the ROI size register: `(height - 1) << 4 | (width - 1)`.
///
/// Widths and heights above 10 force the centre to the optical middle on the
/// real part; that is the sensor's business, not ours.
pub fn roi_size_byte(width: u8, height: u8) -> u8 {
    (height.saturating_sub(1) << 4) | (width.saturating_sub(1) & 0x0F)
}
