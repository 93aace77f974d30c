use core::fmt;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// Number of lamp outputs on the discrete I/O controller.
pub const LAMP_COUNT: usize = 16;

/// Output bitmask as reported by the discrete I/O controller.
///
/// Bit `i` (least significant first) drives lamp `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteStatus {
    pub value: u16,
}

impl DiscreteStatus {
    pub fn new(value: u16) -> Self {
        Self { value }
    }

    pub fn lamps(&self) -> LampChannels {
        LampChannels::decode(Some(*self))
    }
}

impl TryFrom<i64> for DiscreteStatus {
    type Error = crate::Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u16::try_from(value)
            .map(Self::new)
            .map_err(|_| crate::Error::StatusOutOfRange(value))
    }
}

/// On/off state of each lamp, in lamp order (index 0 is L1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LampChannels([bool; LAMP_COUNT]);

impl LampChannels {
    /// Expands a status bitmask into per-lamp states.
    ///
    /// An absent status decodes to all lamps off, which renders the same as a real
    /// status of zero. Callers that need to tell the two apart must keep the
    /// `Option` around.
    pub fn decode(status: Option<DiscreteStatus>) -> Self {
        let mut lamps = [false; LAMP_COUNT];

        if let Some(status) = status {
            for (i, lamp) in lamps.iter_mut().enumerate() {
                *lamp = (status.value >> i) & 1 == 1;
            }
        }

        Self(lamps)
    }

    /// Folds the lamp states back into a bitmask.
    pub fn encode(&self) -> u16 {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(0u16, |acc, (i, _)| acc | (1u16 << i))
    }

    /// State of lamp `number`, counted from 1 as labelled on the panel.
    pub fn lamp(&self, number: usize) -> Option<bool> {
        number
            .checked_sub(1)
            .and_then(|index| self.0.get(index))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    pub fn as_array(&self) -> &[bool; LAMP_COUNT] {
        &self.0
    }
}

impl fmt::Display for LampChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for on in self.iter() {
            f.write_str(if on { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Operating mode selector accepted by the discrete I/O controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum ControlCommand {
    Mode0 = 0,
    Mode1 = 1,
    Mode2 = 2,
    Mode3 = 3,
}

impl ControlCommand {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ControlCommand {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Mode0),
            1 => Ok(Self::Mode1),
            2 => Ok(Self::Mode2),
            3 => Ok(Self::Mode3),
            other => Err(crate::Error::UnknownCommand(other)),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mode {}", self.code())
    }
}
