//! Protocol-wide constants and the service-name enum shared by the
//! transport, fetch, and push modules.

use std::fmt;
use std::str::FromStr;

/// Git service types for smart protocol
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ServiceType {
    UploadPack,
    ReceivePack,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServiceType::UploadPack => write!(f, "git-upload-pack"),
            ServiceType::ReceivePack => write!(f, "git-receive-pack"),
        }
    }
}

impl FromStr for ServiceType {
    type Err = crate::errors::GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git-upload-pack" => Ok(ServiceType::UploadPack),
            "git-receive-pack" => Ok(ServiceType::ReceivePack),
            other => Err(crate::errors::GitError::InvalidFetchStatus(format!(
                "unrecognised service `{other}`"
            ))),
        }
    }
}

pub const LF: char = '\n';
pub const SP: char = ' ';
pub const NUL: char = '\0';
pub const PKT_LINE_END_MARKER: &[u8; 4] = b"0000";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_round_trips_through_display_and_from_str() {
        assert_eq!(ServiceType::from_str("git-upload-pack").unwrap().to_string(), "git-upload-pack");
        assert_eq!(ServiceType::from_str("git-receive-pack").unwrap().to_string(), "git-receive-pack");
        assert!(ServiceType::from_str("bogus").is_err());
    }
}
