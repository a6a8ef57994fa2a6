//! Line-oriented command protocol for the daemon
//!
//! Each stdin line is one JSON command; each command produces one JSON
//! response line. This is the transport the daemon uses to deliver
//! capability reports and user selections to the policy.
//!
//! ```text
//! {"type":"capability","encodings":[2,5]}
//! {"type":"select","device":"dolby_hdmi","format":"compressed_dolby"}
//! {"type":"recompute"}
//! {"type":"snapshot"}
//! ```

use crate::capability::CapabilityReport;
use crate::error::{Error, Result};
use crate::policy::PassthroughPolicy;
use passthru_common::{Encoding, OutputDevice, OutputFormat};
use serde::{Deserialize, Serialize};

/// Inbound command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Sink capability report
    Capability {
        #[serde(default)]
        encodings: Option<Vec<i32>>,
    },
    /// User device selection
    Select {
        device: OutputDevice,
        #[serde(default = "default_select_format")]
        format: OutputFormat,
    },
    /// Re-derive the availability flag
    Recompute,
    /// Report the current state
    Snapshot,
}

fn default_select_format() -> OutputFormat {
    OutputFormat::CompressedDolby
}

/// Outbound response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Capabilities {
        dolby_supported: bool,
        encodings: Option<Vec<Encoding>>,
    },
    Applied {
        status: i32,
    },
    Availability {
        value: Option<i32>,
    },
    State {
        dolby_supported: bool,
        published_availability: Option<i32>,
    },
    Error {
        message: String,
    },
}

/// Decode one command line
pub fn parse_command(line: &str) -> Result<Command> {
    serde_json::from_str(line.trim()).map_err(|e| Error::BadCommand(e.to_string()))
}

/// Run a command against the policy
pub fn dispatch(policy: &PassthroughPolicy, command: Command) -> Response {
    match command {
        Command::Capability { encodings } => {
            let caps = policy.handle_capability_report(&CapabilityReport { encodings });
            Response::Capabilities {
                dolby_supported: caps.dolby_supported,
                encodings: caps.encodings,
            }
        }
        Command::Select { device, format } => match policy.select_device(device, format) {
            Ok(status) => Response::Applied { status },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },
        Command::Recompute => Response::Availability {
            value: policy.recompute_availability(),
        },
        Command::Snapshot => {
            let state = policy.snapshot();
            Response::State {
                dolby_supported: state.dolby_supported,
                published_availability: state.published_availability,
            }
        }
    }
}
