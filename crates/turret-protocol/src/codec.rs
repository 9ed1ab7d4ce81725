//! Control codec: operator input frames to rig actuator frames.
//!
//! Both frames are exactly [`CONTROL_FRAME_LEN`] bytes. The operator side
//! carries six unsigned analog channels and a little-endian button mask;
//! the rig side carries the same six channels re-centred as signed bytes
//! and the button mask in big-endian order.
//!
//! | Bytes | Operator ([`ControlFrame`]) | Rig ([`ActuatorFrame`]) |
//! |-------|-----------------------------|-------------------------|
//! | 0     | left-stick X, `u8`          | `i8`                    |
//! | 1     | left-stick Y, `u8`          | `i8`                    |
//! | 2     | right-stick X, `u8`         | `i8`                    |
//! | 3     | right-stick Y, `u8`         | `i8`                    |
//! | 4     | left trigger, `u8`          | `i8`                    |
//! | 5     | right trigger, `u8`         | `i8`                    |
//! | 6..8  | buttons, `u16` LE           | buttons, `u16` BE       |
//!
//! Every function here is pure.

use crate::error::ProtocolError;

/// Length in bytes of both the control frame and the actuator frame.
pub const CONTROL_FRAME_LEN: usize = 8;

/// Number of analog channels carried by a frame.
pub const ANALOG_CHANNELS: usize = 6;

/// Raw analog value an idle stick rests at.
pub const AXIS_NEUTRAL: u8 = 127;

/// Largest magnitude an actuator channel may carry (symmetric range).
const AXIS_LIMIT: i16 = 127;

/// Raw operator input frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlFrame {
    /// Analog channels in wire order: LX, LY, RX, RY, LT, RT.
    pub axes: [u8; ANALOG_CHANNELS],
    /// Button bitmask, bit `n` set while button `n` is held.
    pub buttons: u16,
}

impl ControlFrame {
    /// The frame an operator sends with nothing touched: sticks centred,
    /// triggers released, no buttons.
    pub const IDLE: Self = Self {
        axes: [AXIS_NEUTRAL, AXIS_NEUTRAL, AXIS_NEUTRAL, AXIS_NEUTRAL, 0, 0],
        buttons: 0,
    };

    /// Decode an operator frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedFrame`] unless `bytes` is exactly
    /// [`CONTROL_FRAME_LEN`] long.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw: &[u8; CONTROL_FRAME_LEN] =
            bytes.try_into().map_err(|_err| ProtocolError::MalformedFrame {
                expected: CONTROL_FRAME_LEN,
                actual: bytes.len(),
            })?;
        let [lx, ly, rx, ry, lt, rt, b0, b1] = *raw;
        Ok(Self {
            axes: [lx, ly, rx, ry, lt, rt],
            buttons: u16::from_le_bytes([b0, b1]),
        })
    }

    /// Encode back into the operator wire layout.
    pub const fn to_bytes(self) -> [u8; CONTROL_FRAME_LEN] {
        let [lx, ly, rx, ry, lt, rt] = self.axes;
        let [b0, b1] = self.buttons.to_le_bytes();
        [lx, ly, rx, ry, lt, rt, b0, b1]
    }
}

/// Translated frame delivered to the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActuatorFrame {
    /// Signed analog channels in the same order as [`ControlFrame::axes`].
    pub channels: [i8; ANALOG_CHANNELS],
    /// Button bitmask, value identical to the operator's.
    pub buttons: u16,
}

impl ActuatorFrame {
    /// Decode a rig-side frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedFrame`] unless `bytes` is exactly
    /// [`CONTROL_FRAME_LEN`] long.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw: &[u8; CONTROL_FRAME_LEN] =
            bytes.try_into().map_err(|_err| ProtocolError::MalformedFrame {
                expected: CONTROL_FRAME_LEN,
                actual: bytes.len(),
            })?;
        let [c0, c1, c2, c3, c4, c5, b0, b1] = *raw;
        Ok(Self {
            channels: [c0, c1, c2, c3, c4, c5].map(|b| i8::from_be_bytes([b])),
            buttons: u16::from_be_bytes([b0, b1]),
        })
    }

    /// Encode into the rig wire layout.
    pub fn to_bytes(self) -> [u8; CONTROL_FRAME_LEN] {
        let [c0, c1, c2, c3, c4, c5] = self.channels.map(|c| c.to_be_bytes()[0]);
        let [b0, b1] = self.buttons.to_be_bytes();
        [c0, c1, c2, c3, c4, c5, b0, b1]
    }
}

/// Re-centre one analog channel: `clamp(value - 127, -127, 127)`.
pub fn scale_axis(value: u8) -> i8 {
    let centred = i16::from(value).saturating_sub(i16::from(AXIS_NEUTRAL));
    // The clamp keeps the value inside i8, so the fallback is unreachable.
    i8::try_from(centred.clamp(-AXIS_LIMIT, AXIS_LIMIT)).unwrap_or(0)
}

/// Translate an operator frame into the rig's actuator frame.
pub fn encode_actuator(frame: &ControlFrame) -> ActuatorFrame {
    ActuatorFrame {
        channels: frame.axes.map(scale_axis),
        buttons: frame.buttons,
    }
}

/// Length-check, decode, and translate a raw operator payload.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] if `bytes` is not exactly
/// [`CONTROL_FRAME_LEN`] long.
pub fn translate_control(bytes: &[u8]) -> Result<ActuatorFrame, ProtocolError> {
    ControlFrame::parse(bytes).map(|frame| encode_actuator(&frame))
}
