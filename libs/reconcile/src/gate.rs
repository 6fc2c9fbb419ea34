//! Instance readiness gate.
//!
//! Structural changes to a router template race with lifecycle transitions of
//! the VMs instantiated from it. The gate holds a mutation back until every
//! dependent VM sits in an allowed state.

use std::convert::Infallible;
use std::time::Duration;

use nebula_id::VmId;
use tracing::{debug, info, warn};

use crate::control_plane::ControlPlane;
use crate::error::BlockedInstance;
use crate::retry::{retry_until, Attempt, RetryError, RetryPolicy, Shutdown};
use crate::state::InstanceState;

/// Why the gate did not open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Deadline passed; one entry per VM still outside the allowed set.
    Blocked(Vec<BlockedInstance>),

    /// Shutdown was requested while waiting.
    Cancelled,
}

/// Wait until every VM in `vm_ids` is in one of `allowed`.
///
/// Every round re-reads all VMs. Read failures are retried and reported
/// against the VM if they persist until the deadline. An empty `vm_ids` opens
/// the gate without any read.
pub async fn wait_ready<C>(
    control_plane: &C,
    vm_ids: &[VmId],
    allowed: &[InstanceState],
    policy: &RetryPolicy,
    timeout: Duration,
    shutdown: &mut Shutdown,
) -> Result<(), GateError>
where
    C: ControlPlane + ?Sized,
{
    let mut unique: Vec<VmId> = Vec::with_capacity(vm_ids.len());
    for vm_id in vm_ids {
        if !unique.contains(vm_id) {
            unique.push(*vm_id);
        }
    }

    if unique.is_empty() {
        return Ok(());
    }

    debug!(vm_count = unique.len(), "Waiting for VMs to settle");

    let vm_ids = unique.as_slice();
    let result = retry_until(policy, timeout, shutdown, |_| async move {
        let mut blocked = Vec::new();

        for &vm_id in vm_ids {
            match control_plane.instance_state(vm_id).await {
                Ok(state) if allowed.contains(&state) => {}
                Ok(state) => {
                    debug!(vm_id = %vm_id, state = %state, "VM not ready");
                    blocked.push(BlockedInstance::in_state(vm_id, state));
                }
                Err(err) => {
                    warn!(vm_id = %vm_id, error = %err, "Failed to read VM state, will retry");
                    blocked.push(BlockedInstance::unobserved(vm_id, err.to_string()));
                }
            }
        }

        if blocked.is_empty() {
            Attempt::<(), _, Infallible>::Ready(())
        } else {
            Attempt::Pending(blocked)
        }
    })
    .await;

    match result {
        Ok(()) => {
            debug!("All VMs ready");
            Ok(())
        }
        Err(RetryError::Timeout {
            elapsed,
            last: blocked,
            ..
        }) => {
            info!(
                elapsed_ms = elapsed.as_millis() as u64,
                blocked = blocked.len(),
                "Gave up waiting for VMs"
            );
            Err(GateError::Blocked(blocked))
        }
        Err(RetryError::Cancelled) => Err(GateError::Cancelled),
        Err(RetryError::Fatal(never)) => match never {},
    }
}
