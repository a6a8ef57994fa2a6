//! Device → format assignment strings
//!
//! Pure construction of the `<id>_format=<value>;` key-value string handed to
//! the backend. No I/O happens here; the policy submits the result.

use passthru_common::{OutputDevice, OutputFormat, PhysicalOutput};
use std::fmt;

/// One `<id>_format=<value>;` segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub output: PhysicalOutput,
    pub format: OutputFormat,
}

impl Segment {
    pub fn new(output: PhysicalOutput, format: OutputFormat) -> Self {
        Self { output, format }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_format={};", self.output.id(), self.format.wire_value())
    }
}

/// Concrete assignment for a requested device and format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub device: OutputDevice,
    /// Format passed by the caller
    pub requested_format: OutputFormat,
    /// Format after Dolby-device forcing
    pub effective_format: OutputFormat,
    /// Segments in submission order
    pub segments: Vec<Segment>,
}

impl Assignment {
    /// The string submitted to the backend
    pub fn key_values(&self) -> String {
        self.segments.iter().map(Segment::to_string).collect()
    }

    /// Whether a successful submission stores `device` as the user preference
    pub fn stores_preference(&self) -> bool {
        self.effective_format.is_compressed()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Format actually negotiated for `device`
///
/// Dolby-branded HDMI and optical selections always negotiate AC-3.
pub fn effective_format(device: OutputDevice, format: OutputFormat) -> OutputFormat {
    if device.forces_ac3() {
        OutputFormat::CompressedAc3
    } else {
        format
    }
}

/// Build the assignment for `device` and `format`
pub fn build_assignment(device: OutputDevice, format: OutputFormat) -> Assignment {
    let effective = effective_format(device, format);

    let segments = match device {
        OutputDevice::AutoHdmi => vec![
            Segment::new(PhysicalOutput::Spdif, OutputFormat::Uncompressed),
            Segment::new(PhysicalOutput::Hdmi, OutputFormat::Auto),
        ],
        OutputDevice::ToslinkNone => vec![Segment::new(
            PhysicalOutput::Spdif,
            OutputFormat::Uncompressed,
        )],
        _ => match device.physical() {
            Some(target) => targeted_segments(target, effective),
            // OutputDevice::None
            None => vec![
                Segment::new(PhysicalOutput::Hdmi, OutputFormat::Uncompressed),
                Segment::new(PhysicalOutput::Spdif, OutputFormat::Uncompressed),
            ],
        },
    };

    Assignment {
        device,
        requested_format: format,
        effective_format: effective,
        segments,
    }
}

/// Segments for a device naming one physical output
///
/// The generic Dolby trigger first parks the other output on uncompressed.
fn targeted_segments(target: PhysicalOutput, format: OutputFormat) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(2);
    if format == OutputFormat::CompressedDolby {
        segments.push(Segment::new(target.other(), OutputFormat::Uncompressed));
    }
    segments.push(Segment::new(target, format));
    segments
}
