//! Error types for control-plane calls and reconciliation.

use std::fmt;
use std::time::Duration;

use nebula_id::{NetworkId, NicId, RouterId, VmId};
use thiserror::Error;

use crate::state::{join_states, InstanceState};

/// Failure modes of the control-plane collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// The resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Transport or server-side failure; the request may be repeated.
    #[error("transient control plane failure: {0}")]
    Transient(String),

    /// The control plane refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ControlPlaneError {
    /// Returns true if an observation loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Structural change issued against a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Attach { network_id: NetworkId },
    Detach { nic_id: NicId },
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attach { network_id } => write!(f, "attach NIC on network {network_id}"),
            Self::Detach { nic_id } => write!(f, "detach NIC {nic_id}"),
        }
    }
}

/// A VM that kept the readiness gate closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedInstance {
    pub vm_id: VmId,

    /// State seen on the last poll, if the poll succeeded.
    pub last_state: Option<InstanceState>,

    /// Error returned by the last poll, if it failed.
    pub last_error: Option<String>,
}

impl BlockedInstance {
    pub fn in_state(vm_id: VmId, state: InstanceState) -> Self {
        Self {
            vm_id,
            last_state: Some(state),
            last_error: None,
        }
    }

    pub fn unobserved(vm_id: VmId, error: impl Into<String>) -> Self {
        Self {
            vm_id,
            last_state: None,
            last_error: Some(error.into()),
        }
    }
}

impl fmt::Display for BlockedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.last_state, &self.last_error) {
            (Some(state), _) => write!(f, "VM {}: state {}", self.vm_id, state),
            (None, Some(error)) => write!(f, "VM {}: {}", self.vm_id, error),
            (None, None) => write!(f, "VM {}: state not observed", self.vm_id),
        }
    }
}

/// Why an attach had not converged when its deadline passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachStall {
    /// No NIC appeared since the mutation.
    NoNewNic,

    /// NICs appeared but none carried every requested pair.
    Unmatched { new_nics: usize },

    /// The matching NIC has no NIC_ID yet.
    Unassigned,

    /// The last poll failed. `new_nics_seen` is the most new NICs any earlier
    /// poll observed.
    PollFailed { error: String, new_nics_seen: usize },
}

impl fmt::Display for AttachStall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNewNic => f.write_str("no new NIC appeared"),
            Self::Unmatched { new_nics } => write!(
                f,
                "{new_nics} new NIC(s) appeared but none matched the request"
            ),
            Self::Unassigned => f.write_str("matching NIC has no NIC_ID assigned"),
            Self::PollFailed {
                error,
                new_nics_seen: 0,
            } => write!(f, "last poll failed: {error}; no new NIC appeared"),
            Self::PollFailed {
                error,
                new_nics_seen,
            } => write!(
                f,
                "last poll failed: {error}; {new_nics_seen} new NIC(s) appeared earlier"
            ),
        }
    }
}

/// Why a detach had not converged when its deadline passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachStall {
    /// The NIC is still listed on the router.
    StillAttached,

    /// The last poll failed.
    PollFailed(String),
}

impl fmt::Display for DetachStall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StillAttached => f.write_str("NIC still attached"),
            Self::PollFailed(error) => write!(f, "last poll failed: {error}"),
        }
    }
}

/// Renders the VMs holding the readiness gate closed.
///
/// ```
/// use nebula_id::VmId;
/// use nebula_reconcile::{BlockedInstance, GateDiagnostic, InstanceState};
///
/// let blocked = [BlockedInstance::in_state(VmId::new(40), InstanceState::Boot)];
/// let allowed = [InstanceState::Running];
/// assert_eq!(
///     GateDiagnostic::new(&allowed, &blocked).to_string(),
///     "waiting for virtual machines to be in state RUNNING:\nVM 40: state BOOT"
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct GateDiagnostic<'a> {
    allowed: &'a [InstanceState],
    blocked: &'a [BlockedInstance],
}

impl<'a> GateDiagnostic<'a> {
    pub fn new(allowed: &'a [InstanceState], blocked: &'a [BlockedInstance]) -> Self {
        Self { allowed, blocked }
    }
}

impl fmt::Display for GateDiagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "waiting for virtual machines to be in state {}:",
            join_states(self.allowed)
        )?;
        for blocked in self.blocked {
            write!(f, "\n{blocked}")?;
        }
        Ok(())
    }
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The NIC request is unusable.
    #[error("invalid NIC request: {0}")]
    InvalidRequest(String),

    /// The router does not exist.
    #[error("virtual router {router_id} not found")]
    RouterNotFound { router_id: RouterId },

    /// Dependent VMs never reached a state allowing the change.
    #[error("virtual router {router_id}: {}", GateDiagnostic::new(.allowed, .blocked))]
    Precondition {
        router_id: RouterId,
        allowed: Vec<InstanceState>,
        blocked: Vec<BlockedInstance>,
    },

    /// The control plane refused the mutation. Nothing changed.
    #[error("virtual router {router_id}: {action} rejected: {reason}")]
    MutationRejected {
        router_id: RouterId,
        action: Mutation,
        reason: String,
    },

    /// The mutation call failed without a verdict. It may or may not apply.
    #[error("virtual router {router_id}: {action} failed: {source}")]
    MutationFailed {
        router_id: RouterId,
        action: Mutation,
        #[source]
        source: ControlPlaneError,
    },

    /// Attach accepted but the new NIC was never observed.
    #[error(
        "virtual router {router_id}: network {network_id}: NIC not attached after {elapsed:?}: {stall}"
    )]
    AttachTimeout {
        router_id: RouterId,
        network_id: NetworkId,
        elapsed: Duration,
        stall: AttachStall,
    },

    /// Detach accepted but the NIC never disappeared.
    #[error("virtual router {router_id}: NIC {nic_id}: not detached after {elapsed:?}: {stall}")]
    DetachTimeout {
        router_id: RouterId,
        nic_id: NicId,
        elapsed: Duration,
        stall: DetachStall,
    },

    /// A read failed in a way retrying cannot fix.
    #[error("virtual router {router_id}: {source}")]
    ControlPlane {
        router_id: RouterId,
        #[source]
        source: ControlPlaneError,
    },

    /// The wait was interrupted by shutdown.
    #[error("virtual router {router_id}: operation cancelled")]
    Cancelled { router_id: RouterId },
}

impl ReconcileError {
    /// Returns true if the mutation was accepted but its effect is unconfirmed.
    pub fn is_convergence_timeout(&self) -> bool {
        matches!(self, Self::AttachTimeout { .. } | Self::DetachTimeout { .. })
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition { .. })
    }

    /// VMs that held the gate closed; empty for other errors.
    pub fn blocked_instances(&self) -> &[BlockedInstance] {
        match self {
            Self::Precondition { blocked, .. } => blocked,
            _ => &[],
        }
    }

    /// The router the failed operation targeted.
    pub fn router_id(&self) -> Option<RouterId> {
        match self {
            Self::InvalidRequest(_) => None,
            Self::RouterNotFound { router_id }
            | Self::Precondition { router_id, .. }
            | Self::MutationRejected { router_id, .. }
            | Self::MutationFailed { router_id, .. }
            | Self::AttachTimeout { router_id, .. }
            | Self::DetachTimeout { router_id, .. }
            | Self::ControlPlane { router_id, .. }
            | Self::Cancelled { router_id } => Some(*router_id),
        }
    }

    /// Map a failed read of the router.
    pub(crate) fn from_read(router_id: RouterId, err: ControlPlaneError) -> Self {
        match err {
            ControlPlaneError::NotFound(_) => Self::RouterNotFound { router_id },
            source => Self::ControlPlane { router_id, source },
        }
    }

    /// Map a failed mutation call.
    pub(crate) fn from_mutation(
        router_id: RouterId,
        action: Mutation,
        err: ControlPlaneError,
    ) -> Self {
        match err {
            ControlPlaneError::Rejected(reason) => Self::MutationRejected {
                router_id,
                action,
                reason,
            },
            source => Self::MutationFailed {
                router_id,
                action,
                source,
            },
        }
    }
}
