//! Error handling and display for the CLI.

use colored::Colorize;
use nebula_reconcile::{
    BlockedInstance, ControlPlaneError, GateDiagnostic, InstanceState, ReconcileError,
};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid NIC attribute '{0}': expected KEY=VALUE")]
    InvalidPair(String),

    #[error("Use --network to set NETWORK_ID")]
    NetworkPair,

    #[error("VMs not ready: {}", GateDiagnostic::new(.allowed, .blocked))]
    NotReady {
        allowed: Vec<InstanceState>,
        blocked: Vec<BlockedInstance>,
    },

    #[error("Interrupted")]
    Cancelled,
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(reconcile_err) = err.downcast_ref::<ReconcileError>() {
        match reconcile_err {
            ReconcileError::Precondition { .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: Nothing was changed. Retry once the VMs have settled, or raise --timeout-secs."
                        .yellow()
                );
            }
            ReconcileError::AttachTimeout { router_id, .. }
            | ReconcileError::DetachTimeout { router_id, .. } => {
                eprintln!(
                    "\n{}",
                    format!(
                        "Hint: The control plane accepted the request and may still apply it. \
                         Check `vrctl show {router_id}` before retrying."
                    )
                    .yellow()
                );
            }
            ReconcileError::MutationFailed { .. } => {
                eprintln!(
                    "\n{}",
                    "Hint: The request may or may not have been applied. Check `vrctl show` before retrying."
                        .yellow()
                );
            }
            ReconcileError::ControlPlane {
                source: ControlPlaneError::Transient(_),
                ..
            } => {
                eprintln!(
                    "\n{}",
                    "Hint: Check your network connection and --endpoint.".yellow()
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use nebula_id::{RouterId, VmId};
    use nebula_reconcile::NIC_UPDATE_READY_STATES;

    use super::*;

    #[test]
    fn test_not_ready_matches_precondition_diagnostic() {
        let allowed = NIC_UPDATE_READY_STATES.to_vec();
        let blocked = vec![
            BlockedInstance::in_state(VmId::new(40), InstanceState::Boot),
            BlockedInstance::unobserved(VmId::new(41), "VM 41 not found"),
        ];

        let not_ready = CliError::NotReady {
            allowed: allowed.clone(),
            blocked: blocked.clone(),
        };
        let precondition = ReconcileError::Precondition {
            router_id: RouterId::new(3),
            allowed,
            blocked,
        };

        assert_eq!(
            not_ready.to_string(),
            "VMs not ready: waiting for virtual machines to be in state RUNNING POWEROFF DONE:\n\
             VM 40: state BOOT\n\
             VM 41: VM 41 not found"
        );
        assert_eq!(
            not_ready.to_string().strip_prefix("VMs not ready: "),
            precondition.to_string().strip_prefix("virtual router 3: ")
        );
    }
}
