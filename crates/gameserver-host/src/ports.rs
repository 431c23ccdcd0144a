//! Listening-port snapshot taken from `ss -tuln`.

use std::collections::BTreeSet;

use gameserver_core::CollaboratorError;
use serde::Serialize;
use tokio::process::Command;

use crate::command::checked;

const SS_PROGRAM: &str = "ss";
const LOCAL_ADDRESS_COLUMN: usize = 4;

/// Whether a declared port is listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// A socket is bound to the port.
    Listening,
    /// No socket is bound to the port.
    Closed,
    /// The probe failed.
    Unknown,
}

impl PortState {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Listening => "listening",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }
}

/// Ports with a listening TCP or UDP socket at probe time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSnapshot {
    listening: BTreeSet<u16>,
}

impl PortSnapshot {
    /// Parse `ss -tuln` output.
    #[must_use]
    pub fn parse(output: &str) -> Self {
        let listening = output
            .lines()
            .filter_map(|line| line.split_whitespace().nth(LOCAL_ADDRESS_COLUMN))
            .filter_map(|address| address.rsplit_once(':'))
            .filter_map(|(_, port)| port.parse::<u16>().ok())
            .collect();
        Self { listening }
    }

    /// State of `port`.
    #[must_use]
    pub fn state(&self, port: u16) -> PortState {
        if self.listening.contains(&port) {
            PortState::Listening
        } else {
            PortState::Closed
        }
    }

    /// Listening ports within `start..=end`.
    #[must_use]
    pub fn listening_in(&self, start: u16, end: u16) -> Vec<u16> {
        self.listening.range(start..=end).copied().collect()
    }
}

/// Take one snapshot of the host's listening sockets.
///
/// # Errors
///
/// Returns a collaborator error when `ss` cannot be run or fails.
pub async fn probe_listening_ports() -> Result<PortSnapshot, CollaboratorError> {
    let mut command = Command::new(SS_PROGRAM);
    command.arg("-tuln");
    let output = checked(SS_PROGRAM, command).await?;
    Ok(PortSnapshot::parse(&String::from_utf8_lossy(&output.stdout)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Netid State  Recv-Q Send-Q  Local Address:Port   Peer Address:Port Process
udp   UNCONN 0      0             0.0.0.0:2456        0.0.0.0:*
udp   UNCONN 0      0             0.0.0.0:2457        0.0.0.0:*
udp   UNCONN 0      0       127.0.0.53%lo:53          0.0.0.0:*
tcp   LISTEN 0      4096          0.0.0.0:26900       0.0.0.0:*
tcp   LISTEN 0      128              [::]:27015          [::]:*
tcp   LISTEN 0      128                 *:8080              *:*
";

    #[test]
    fn parses_local_ports_across_address_families() {
        let snapshot = PortSnapshot::parse(SAMPLE);
        assert_eq!(snapshot.state(2456), PortState::Listening);
        assert_eq!(snapshot.state(53), PortState::Listening);
        assert_eq!(snapshot.state(27015), PortState::Listening);
        assert_eq!(snapshot.state(8080), PortState::Listening);
        assert_eq!(snapshot.state(2458), PortState::Closed);
    }

    #[test]
    fn game_range_lists_only_matching_ports() {
        let snapshot = PortSnapshot::parse(SAMPLE);
        assert_eq!(snapshot.listening_in(26_000, 28_000), vec![26_900, 27_015]);
    }

    #[test]
    fn header_and_garbage_lines_are_ignored() {
        let snapshot = PortSnapshot::parse("Netid State\nnot a socket line\n");
        assert!(snapshot.listening_in(0, u16::MAX).is_empty());
    }
}
