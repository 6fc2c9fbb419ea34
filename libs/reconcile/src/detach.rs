//! Synchronous NIC detach.

use std::time::Duration;

use nebula_id::{NicId, RouterId};
use tracing::{debug, info, warn};

use crate::control_plane::ControlPlane;
use crate::error::{DetachStall, Mutation, ReconcileError};
use crate::reconciler::NicReconciler;
use crate::retry::{retry_until, Attempt, RetryError};

impl<C: ControlPlane + ?Sized> NicReconciler<C> {
    /// Detach a NIC from a router and wait until the router no longer lists it.
    ///
    /// The router's VMs must be RUNNING, POWEROFF or DONE before the detach is
    /// issued. `timeout` bounds that wait and the wait for the NIC to disappear
    /// separately.
    pub async fn detach(
        &self,
        router_id: RouterId,
        nic_id: NicId,
        timeout: Duration,
    ) -> Result<(), ReconcileError> {
        info!(router_id = %router_id, nic_id = %nic_id, "Detaching NIC from virtual router");

        let snapshot = self.snapshot(router_id).await?;
        if !snapshot.has_nic(nic_id) {
            debug!(
                router_id = %router_id,
                nic_id = %nic_id,
                "NIC not listed before detach, control plane decides"
            );
        }

        self.gate(&snapshot, timeout).await?;
        drop(snapshot);

        self.control_plane
            .detach_nic(router_id, nic_id)
            .await
            .map_err(|err| {
                ReconcileError::from_mutation(router_id, Mutation::Detach { nic_id }, err)
            })?;
        debug!(router_id = %router_id, nic_id = %nic_id, "Detach accepted, waiting for NIC to go away");

        let control_plane = &*self.control_plane;
        let mut shutdown = self.shutdown.clone();

        let result = retry_until(&self.policy, timeout, &mut shutdown, |_| async move {
            match control_plane.router_snapshot(router_id).await {
                Ok(current) if current.has_nic(nic_id) => {
                    Attempt::Pending(DetachStall::StillAttached)
                }
                Ok(_) => Attempt::Ready(()),
                Err(err) if err.is_retryable() => {
                    warn!(router_id = %router_id, error = %err, "Failed to poll virtual router, will retry");
                    Attempt::Pending(DetachStall::PollFailed(err.to_string()))
                }
                Err(err) => Attempt::Fatal(ReconcileError::from_read(router_id, err)),
            }
        })
        .await;

        match result {
            Ok(()) => {
                info!(router_id = %router_id, nic_id = %nic_id, "NIC detached");
                Ok(())
            }
            Err(RetryError::Timeout { elapsed, last, .. }) => {
                Err(ReconcileError::DetachTimeout {
                    router_id,
                    nic_id,
                    elapsed,
                    stall: last,
                })
            }
            Err(RetryError::Cancelled) => Err(ReconcileError::Cancelled { router_id }),
            Err(RetryError::Fatal(err)) => Err(err),
        }
    }
}
