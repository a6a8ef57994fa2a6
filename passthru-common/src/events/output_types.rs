//! Output routing type definitions
//!
//! Encodings reported by a sink, the output devices a user can pick and the
//! formats the backend understands. Devices and formats are persisted and sent
//! over the wire as integers, so every conversion from an integer is checked
//! against the tables below.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Audio encoding reported by a sink
///
/// Integer codes follow the platform audio-format table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Token or code not in the table (code 0)
    Unknown,
    /// Linear PCM, 16 bit
    Pcm16,
    /// Dolby Digital
    Ac3,
    /// Dolby Digital Plus
    Eac3,
}

impl Encoding {
    pub const PCM16_CODE: i32 = 2;
    pub const AC3_CODE: i32 = 5;
    pub const EAC3_CODE: i32 = 6;

    pub fn code(self) -> i32 {
        match self {
            Encoding::Unknown => 0,
            Encoding::Pcm16 => Self::PCM16_CODE,
            Encoding::Ac3 => Self::AC3_CODE,
            Encoding::Eac3 => Self::EAC3_CODE,
        }
    }

    /// Map a platform code to an encoding; codes outside the table are `Unknown`
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::PCM16_CODE => Encoding::Pcm16,
            Self::AC3_CODE => Encoding::Ac3,
            Self::EAC3_CODE => Encoding::Eac3,
            _ => Encoding::Unknown,
        }
    }

    /// Map a descriptor token (`pcm`, `ac3`, `eac3`); anything else is `Unknown`
    pub fn from_token(token: &str) -> Self {
        match token {
            "pcm" => Encoding::Pcm16,
            "ac3" => Encoding::Ac3,
            "eac3" => Encoding::Eac3,
            _ => Encoding::Unknown,
        }
    }
}

/// Physical digital output on the device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalOutput {
    Hdmi,
    Spdif,
}

impl PhysicalOutput {
    /// Identifier used in backend key-value strings
    pub fn id(self) -> &'static str {
        match self {
            PhysicalOutput::Hdmi => "hdmi",
            PhysicalOutput::Spdif => "spdif",
        }
    }

    /// The output that is not `self`
    pub fn other(self) -> Self {
        match self {
            PhysicalOutput::Hdmi => PhysicalOutput::Spdif,
            PhysicalOutput::Spdif => PhysicalOutput::Hdmi,
        }
    }
}

impl std::fmt::Display for PhysicalOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Output device selection stored as the user's compressed-audio preference
///
/// The ordinal is the persisted value. Never reorder these variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutputDevice {
    /// No compressed output anywhere
    None,
    Hdmi,
    Toslink,
    /// HDMI passthrough decided by the sink's capability report
    AutoHdmi,
    /// HDMI, always AC-3
    DolbyHdmi,
    /// Optical, always AC-3
    DolbyToslink,
    /// Optical forced to uncompressed
    ToslinkNone,
}

impl OutputDevice {
    /// All devices in ordinal order
    pub const ALL: [OutputDevice; 7] = [
        OutputDevice::None,
        OutputDevice::Hdmi,
        OutputDevice::Toslink,
        OutputDevice::AutoHdmi,
        OutputDevice::DolbyHdmi,
        OutputDevice::DolbyToslink,
        OutputDevice::ToslinkNone,
    ];

    pub fn ordinal(self) -> i32 {
        match self {
            OutputDevice::None => 0,
            OutputDevice::Hdmi => 1,
            OutputDevice::Toslink => 2,
            OutputDevice::AutoHdmi => 3,
            OutputDevice::DolbyHdmi => 4,
            OutputDevice::DolbyToslink => 5,
            OutputDevice::ToslinkNone => 6,
        }
    }

    /// Decode a persisted ordinal
    ///
    /// # Errors
    /// `Error::UnknownDevice` for any value outside 0..=6.
    pub fn from_ordinal(ordinal: i32) -> Result<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(Error::UnknownDevice(ordinal))
    }

    /// Physical output this selection targets
    ///
    /// `None` and `Auto_HDMI` name no single output.
    pub fn physical(self) -> Option<PhysicalOutput> {
        match self {
            OutputDevice::None | OutputDevice::AutoHdmi => None,
            OutputDevice::Hdmi | OutputDevice::DolbyHdmi => Some(PhysicalOutput::Hdmi),
            OutputDevice::Toslink | OutputDevice::DolbyToslink | OutputDevice::ToslinkNone => {
                Some(PhysicalOutput::Spdif)
            }
        }
    }

    /// Identifier of the device
    pub fn id(self) -> &'static str {
        match (self, self.physical()) {
            (_, Some(output)) => output.id(),
            (OutputDevice::AutoHdmi, None) => "auto_hdmi",
            (_, None) => "none",
        }
    }

    /// Dolby-branded selections always negotiate AC-3
    pub fn forces_ac3(self) -> bool {
        matches!(self, OutputDevice::DolbyHdmi | OutputDevice::DolbyToslink)
    }
}

impl std::fmt::Display for OutputDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputDevice::None => write!(f, "None"),
            OutputDevice::Hdmi => write!(f, "HDMI"),
            OutputDevice::Toslink => write!(f, "TOSLINK"),
            OutputDevice::AutoHdmi => write!(f, "Auto_HDMI"),
            OutputDevice::DolbyHdmi => write!(f, "Dolby_HDMI"),
            OutputDevice::DolbyToslink => write!(f, "Dolby_TOSLINK"),
            OutputDevice::ToslinkNone => write!(f, "TOSLINK_None"),
        }
    }
}

/// Format requested from the backend for one physical output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Uncompressed,
    /// Generic compressed trigger; the backend picks the Dolby flavour
    CompressedDolby,
    CompressedAc3,
    /// Backend follows the sink's capabilities
    Auto,
}

impl OutputFormat {
    /// All formats in ordinal order
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Uncompressed,
        OutputFormat::CompressedDolby,
        OutputFormat::CompressedAc3,
        OutputFormat::Auto,
    ];

    /// Value sent to the backend (not the ordinal)
    pub fn wire_value(self) -> i32 {
        match self {
            OutputFormat::Uncompressed => 0,
            OutputFormat::CompressedDolby => 1,
            OutputFormat::CompressedAc3 => 4,
            OutputFormat::Auto => 5,
        }
    }

    pub fn from_wire_value(value: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.wire_value() == value)
            .ok_or(Error::UnknownFormat(value))
    }

    pub fn ordinal(self) -> i32 {
        match self {
            OutputFormat::Uncompressed => 0,
            OutputFormat::CompressedDolby => 1,
            OutputFormat::CompressedAc3 => 2,
            OutputFormat::Auto => 3,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Result<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(Error::UnknownFormat(ordinal))
    }

    /// Formats whose successful application stores the device as the preference
    pub fn is_compressed(self) -> bool {
        matches!(self, OutputFormat::CompressedDolby | OutputFormat::CompressedAc3)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Uncompressed => write!(f, "Uncompressed"),
            OutputFormat::CompressedDolby => write!(f, "Compressed_Dolby"),
            OutputFormat::CompressedAc3 => write!(f, "Compressed_AC3"),
            OutputFormat::Auto => write!(f, "Auto"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ordinals_are_positional() {
        for (idx, device) in OutputDevice::ALL.iter().enumerate() {
            assert_eq!(device.ordinal(), idx as i32);
            assert_eq!(OutputDevice::from_ordinal(idx as i32).unwrap(), *device);
        }
    }

    #[test]
    fn test_device_out_of_range_is_error() {
        assert!(matches!(
            OutputDevice::from_ordinal(7),
            Err(Error::UnknownDevice(7))
        ));
        assert!(matches!(
            OutputDevice::from_ordinal(-1),
            Err(Error::UnknownDevice(-1))
        ));
    }

    #[test]
    fn test_device_ids() {
        assert_eq!(OutputDevice::None.id(), "none");
        assert_eq!(OutputDevice::AutoHdmi.id(), "auto_hdmi");
        assert_eq!(OutputDevice::Hdmi.id(), OutputDevice::DolbyHdmi.id());
        assert_eq!(OutputDevice::Toslink.id(), OutputDevice::DolbyToslink.id());
        assert_eq!(OutputDevice::ToslinkNone.id(), "spdif");
    }

    #[test]
    fn test_device_physical_outputs() {
        assert_eq!(OutputDevice::None.physical(), None);
        assert_eq!(OutputDevice::AutoHdmi.physical(), None);
        assert_eq!(OutputDevice::DolbyHdmi.physical(), Some(PhysicalOutput::Hdmi));
        assert_eq!(OutputDevice::ToslinkNone.physical(), Some(PhysicalOutput::Spdif));
        for device in OutputDevice::ALL {
            if let Some(output) = device.physical() {
                assert_eq!(device.id(), output.id());
            }
        }
    }

    #[test]
    fn test_format_wire_values() {
        let values: Vec<i32> = OutputFormat::ALL.iter().map(|f| f.wire_value()).collect();
        assert_eq!(values, vec![0, 1, 4, 5]);
        assert_eq!(
            OutputFormat::from_wire_value(4).unwrap(),
            OutputFormat::CompressedAc3
        );
        assert!(matches!(
            OutputFormat::from_wire_value(2),
            Err(Error::UnknownFormat(2))
        ));
    }

    #[test]
    fn test_format_ordinal_differs_from_wire_value() {
        assert_eq!(OutputFormat::from_ordinal(3).unwrap(), OutputFormat::Auto);
        assert_eq!(OutputFormat::Auto.wire_value(), 5);
        assert!(OutputFormat::from_ordinal(4).is_err());
    }

    #[test]
    fn test_encoding_codes() {
        assert_eq!(Encoding::from_code(5), Encoding::Ac3);
        assert_eq!(Encoding::from_code(6), Encoding::Eac3);
        assert_eq!(Encoding::from_code(13), Encoding::Unknown);
        assert_eq!(Encoding::Pcm16.code(), 2);
    }

    #[test]
    fn test_encoding_tokens() {
        assert_eq!(Encoding::from_token("pcm"), Encoding::Pcm16);
        assert_eq!(Encoding::from_token("ac3"), Encoding::Ac3);
        assert_eq!(Encoding::from_token("eac3"), Encoding::Eac3);
        assert_eq!(Encoding::from_token("dts"), Encoding::Unknown);
        assert_eq!(Encoding::from_token("AC3"), Encoding::Unknown);
        assert_eq!(Encoding::Unknown.code(), 0);
    }
}
