//! Synchronous NIC attach.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nebula_id::{NicId, RouterId};
use tracing::{debug, info, warn};

use crate::control_plane::ControlPlane;
use crate::error::{AttachStall, Mutation, ReconcileError};
use crate::matcher::{classify, MatchOutcome, ReferenceSet};
use crate::nic::NicRequest;
use crate::reconciler::NicReconciler;
use crate::retry::{retry_until, Attempt, RetryError};

impl<C: ControlPlane + ?Sized> NicReconciler<C> {
    /// Attach a NIC to a router and return the ID the control plane assigned.
    ///
    /// Steps:
    /// 1. Snapshot the router; its NICs become the reference set
    /// 2. Wait for the router's VMs to be RUNNING, POWEROFF or DONE
    /// 3. Issue the attach, once
    /// 4. Poll until a NIC outside the reference set carries every requested pair
    ///
    /// `timeout` bounds step 2 and step 4 separately. A timeout in step 4
    /// leaves the outcome unknown: the NIC may still show up later.
    pub async fn attach(
        &self,
        router_id: RouterId,
        request: &NicRequest,
        timeout: Duration,
    ) -> Result<NicId, ReconcileError> {
        let network_id = request.network_id();
        info!(
            router_id = %router_id,
            network_id = %network_id,
            nic = %request.to_descriptor(),
            "Attaching NIC to virtual router"
        );

        let snapshot = self.snapshot(router_id).await?;
        let reference: ReferenceSet = snapshot.nics().iter().collect();
        debug!(
            router_id = %router_id,
            reference_nics = reference.len(),
            vms = snapshot.vms().len(),
            "Recorded reference NIC set"
        );

        self.gate(&snapshot, timeout).await?;
        drop(snapshot);

        self.control_plane
            .attach_nic(router_id, request)
            .await
            .map_err(|err| {
                ReconcileError::from_mutation(router_id, Mutation::Attach { network_id }, err)
            })?;
        debug!(router_id = %router_id, "Attach accepted, waiting for NIC to appear");

        let control_plane = &*self.control_plane;
        let reference = &reference;
        let new_nics_seen = &AtomicUsize::new(0);
        let mut shutdown = self.shutdown.clone();

        let result = retry_until(&self.policy, timeout, &mut shutdown, |_| async move {
            let current = match control_plane.router_snapshot(router_id).await {
                Ok(current) => current,
                Err(err) if err.is_retryable() => {
                    warn!(router_id = %router_id, error = %err, "Failed to poll virtual router, will retry");
                    return Attempt::Pending(AttachStall::PollFailed {
                        error: err.to_string(),
                        new_nics_seen: new_nics_seen.load(Ordering::Relaxed),
                    });
                }
                Err(err) => return Attempt::Fatal(ReconcileError::from_read(router_id, err)),
            };

            match classify(reference, current.nics(), request) {
                MatchOutcome::NoNewNics => Attempt::Pending(AttachStall::NoNewNic),
                MatchOutcome::Unmatched { new_nics } => {
                    new_nics_seen.fetch_max(new_nics, Ordering::Relaxed);
                    Attempt::Pending(AttachStall::Unmatched { new_nics })
                }
                MatchOutcome::Matched(nic) => match nic.nic_id() {
                    Some(nic_id) => Attempt::Ready(nic_id),
                    None => {
                        new_nics_seen.fetch_max(1, Ordering::Relaxed);
                        Attempt::Pending(AttachStall::Unassigned)
                    }
                },
            }
        })
        .await;

        match result {
            Ok(nic_id) => {
                info!(
                    router_id = %router_id,
                    network_id = %network_id,
                    nic_id = %nic_id,
                    "NIC attached"
                );
                Ok(nic_id)
            }
            Err(RetryError::Timeout { elapsed, last, .. }) => {
                Err(ReconcileError::AttachTimeout {
                    router_id,
                    network_id,
                    elapsed,
                    stall: last,
                })
            }
            Err(RetryError::Cancelled) => Err(ReconcileError::Cancelled { router_id }),
            Err(RetryError::Fatal(err)) => Err(err),
        }
    }
}
