//! Remote commands
//!
//! Commands are bare identifiers with no payload. The set a deployment
//! offers is fixed at construction time and injected wherever it is needed;
//! nothing in the crate mutates it afterwards.

use serde::{Deserialize, Serialize};

/// A command the remote unit can send to the hangar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    name: String,
}

impl Command {
    /// Create a command with the given identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The command identifier as configured (case preserved; the wire
    /// encoder uppercases on the way out).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The default command set of the hangar firmware.
    pub fn builtin() -> Vec<Command> {
        ["OPEN", "CLOSE", "TAKEOFF", "LAND"]
            .into_iter()
            .map(Command::new)
            .collect()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
