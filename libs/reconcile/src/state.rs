//! Lifecycle states of VMs riding on a virtual router.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle label reported by the control plane for a VM.
///
/// The label folds the VM state and its LCM sub-state into one value: an active
/// VM reports its LCM state (`RUNNING`, `BOOT`, `MIGRATE`...), any other VM
/// reports its VM state (`POWEROFF`, `DONE`...). Labels the engine does not know
/// are kept verbatim in [`InstanceState::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Init,
    Pending,
    Hold,
    Prolog,
    Boot,
    Running,
    Migrate,
    Save,
    Epilog,
    Shutdown,
    Hotplug,
    HotplugNic,
    Cleanup,
    Stopped,
    Suspended,
    Poweroff,
    Undeployed,
    Failure,
    Unknown,
    Done,
    Other(String),
}

/// States in which a router's VMs tolerate a structural template change.
pub const NIC_UPDATE_READY_STATES: [InstanceState; 3] = [
    InstanceState::Running,
    InstanceState::Poweroff,
    InstanceState::Done,
];

impl InstanceState {
    /// The control plane's label for this state.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Init => "INIT",
            Self::Pending => "PENDING",
            Self::Hold => "HOLD",
            Self::Prolog => "PROLOG",
            Self::Boot => "BOOT",
            Self::Running => "RUNNING",
            Self::Migrate => "MIGRATE",
            Self::Save => "SAVE",
            Self::Epilog => "EPILOG",
            Self::Shutdown => "SHUTDOWN",
            Self::Hotplug => "HOTPLUG",
            Self::HotplugNic => "HOTPLUG_NIC",
            Self::Cleanup => "CLEANUP",
            Self::Stopped => "STOPPED",
            Self::Suspended => "SUSPENDED",
            Self::Poweroff => "POWEROFF",
            Self::Undeployed => "UNDEPLOYED",
            Self::Failure => "FAILURE",
            Self::Unknown => "UNKNOWN",
            Self::Done => "DONE",
            Self::Other(label) => label,
        }
    }

    /// Returns true for states the VM is expected to leave on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Init
                | Self::Pending
                | Self::Prolog
                | Self::Boot
                | Self::Migrate
                | Self::Save
                | Self::Epilog
                | Self::Shutdown
                | Self::Hotplug
                | Self::HotplugNic
                | Self::Cleanup
        )
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_uppercase();
        Ok(match label.as_str() {
            "INIT" => Self::Init,
            "PENDING" => Self::Pending,
            "HOLD" => Self::Hold,
            "PROLOG" => Self::Prolog,
            "BOOT" => Self::Boot,
            "RUNNING" => Self::Running,
            "MIGRATE" => Self::Migrate,
            "SAVE" => Self::Save,
            "EPILOG" => Self::Epilog,
            "SHUTDOWN" => Self::Shutdown,
            "HOTPLUG" => Self::Hotplug,
            "HOTPLUG_NIC" => Self::HotplugNic,
            "CLEANUP" => Self::Cleanup,
            "STOPPED" => Self::Stopped,
            "SUSPENDED" => Self::Suspended,
            "POWEROFF" => Self::Poweroff,
            "UNDEPLOYED" => Self::Undeployed,
            "FAILURE" => Self::Failure,
            "UNKNOWN" => Self::Unknown,
            "DONE" => Self::Done,
            _ => Self::Other(label),
        })
    }
}

impl Serialize for InstanceState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InstanceState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        let Ok(state) = label.parse::<InstanceState>();
        Ok(state)
    }
}

/// Join state labels with spaces, as used in diagnostics.
pub(crate) fn join_states(states: &[InstanceState]) -> String {
    states
        .iter()
        .map(InstanceState::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}
