//! Access protocol tags.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::error::ScanError;

/// Protocol through which an entry was observed.
///
/// The string form is what gets persisted in the `protocol` column and what
/// connection descriptors name in configuration.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Protocol {
    /// The filesystem of the scanning machine.
    Local,
    /// SSH with the SFTP subsystem.
    #[strum(to_string = "ssh", serialize = "sftp")]
    #[serde(alias = "sftp")]
    Ssh,
    /// Plain FTP.
    Ftp,
    /// Telnet.
    Telnet,
}

impl Protocol {
    /// Resolve a configured protocol name.
    ///
    /// Unknown names fail with [`ScanError::UnsupportedProtocol`] naming the
    /// offending value.
    pub fn parse(name: &str) -> Result<Self, ScanError> {
        name.trim()
            .parse()
            .map_err(|_| ScanError::UnsupportedProtocol {
                protocol: name.to_string(),
            })
    }

    /// Default TCP port for remote protocols.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Protocol::Local => None,
            Protocol::Ssh => Some(22),
            Protocol::Ftp => Some(21),
            Protocol::Telnet => Some(23),
        }
    }

    /// Check if this protocol reaches another machine.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Protocol::Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Protocol::parse("ssh").unwrap(), Protocol::Ssh);
        assert_eq!(Protocol::parse("SFTP").unwrap(), Protocol::Ssh);
        assert_eq!(Protocol::parse(" ftp ").unwrap(), Protocol::Ftp);
        assert_eq!(Protocol::parse("telnet").unwrap(), Protocol::Telnet);
    }

    #[test]
    fn test_parse_unknown_names_protocol() {
        let err = Protocol::parse("gopher").unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedProtocol { ref protocol } if protocol == "gopher"));
        assert!(err.to_string().contains("gopher"));
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(Protocol::Ssh.to_string(), "ssh");
        assert_eq!(Protocol::Local.as_ref(), "local");
    }
}
