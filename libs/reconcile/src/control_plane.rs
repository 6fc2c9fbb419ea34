//! Control-plane interface consumed by the reconcilers.
//!
//! Implementations talk to the remote virtualization API. Reads must always hit
//! the remote side: the diff is only correct against fresh state, so no
//! implementation may cache snapshots between calls.

use async_trait::async_trait;
use nebula_id::{NicId, RouterId, VmId};

use crate::error::ControlPlaneError;
use crate::nic::NicRequest;
use crate::snapshot::RouterSnapshot;
use crate::state::InstanceState;

/// Remote control-plane operations.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Read the router's NICs and dependent VMs.
    async fn router_snapshot(&self, router_id: RouterId)
        -> Result<RouterSnapshot, ControlPlaneError>;

    /// Read a VM's lifecycle state.
    async fn instance_state(&self, vm_id: VmId) -> Result<InstanceState, ControlPlaneError>;

    /// Ask the control plane to attach a NIC. Success means accepted, not applied.
    async fn attach_nic(
        &self,
        router_id: RouterId,
        request: &NicRequest,
    ) -> Result<(), ControlPlaneError>;

    /// Ask the control plane to detach a NIC. Success means accepted, not applied.
    async fn detach_nic(&self, router_id: RouterId, nic_id: NicId)
        -> Result<(), ControlPlaneError>;
}
