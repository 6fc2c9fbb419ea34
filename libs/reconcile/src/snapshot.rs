//! Point-in-time view of a virtual router.

use nebula_id::{NicId, RouterId, VmId};
use serde::{Deserialize, Serialize};

use crate::nic::NicDescriptor;

/// A virtual router as read from the control plane.
///
/// Snapshots are never updated in place; every poll produces a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSnapshot {
    router_id: RouterId,
    nics: Vec<NicDescriptor>,
    vms: Vec<VmId>,
}

impl RouterSnapshot {
    /// Create a snapshot from its parts.
    pub fn new(router_id: RouterId, nics: Vec<NicDescriptor>, vms: Vec<VmId>) -> Self {
        Self {
            router_id,
            nics,
            vms,
        }
    }

    /// A router with no NICs and no VMs.
    pub fn empty(router_id: RouterId) -> Self {
        Self::new(router_id, Vec::new(), Vec::new())
    }

    /// Add a NIC, returning the snapshot.
    #[must_use]
    pub fn with_nic(mut self, nic: NicDescriptor) -> Self {
        self.nics.push(nic);
        self
    }

    /// Add a dependent VM, returning the snapshot.
    #[must_use]
    pub fn with_vm(mut self, vm_id: VmId) -> Self {
        self.vms.push(vm_id);
        self
    }

    pub fn router_id(&self) -> RouterId {
        self.router_id
    }

    /// Attached NICs in template order.
    pub fn nics(&self) -> &[NicDescriptor] {
        &self.nics
    }

    /// VMs instantiated for this router.
    pub fn vms(&self) -> &[VmId] {
        &self.vms
    }

    /// Returns true if VMs ride on this router.
    pub fn has_dependents(&self) -> bool {
        !self.vms.is_empty()
    }

    /// Assigned identifiers of the attached NICs.
    pub fn nic_ids(&self) -> impl Iterator<Item = NicId> + '_ {
        self.nics.iter().filter_map(NicDescriptor::nic_id)
    }

    /// Returns true if a NIC with this identifier is attached.
    pub fn has_nic(&self, nic_id: NicId) -> bool {
        self.nic_ids().any(|id| id == nic_id)
    }
}
