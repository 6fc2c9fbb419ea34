//! Typed ID definitions for control-plane resources.
//!
//! The control plane hands out small integer IDs per resource pool, so the
//! same number routinely refers to a router, a VM and a network at once.

use crate::define_id;

// =============================================================================
// Networking
// =============================================================================

define_id!(
    /// Virtual router ID.
    RouterId,
    "virtual router"
);

define_id!(
    /// Virtual network ID.
    NetworkId,
    "network"
);

define_id!(
    /// NIC ID. Only unique within the router (or VM) that owns the NIC.
    NicId,
    "NIC"
);

// =============================================================================
// Compute
// =============================================================================

define_id!(
    /// Virtual machine ID.
    VmId,
    "VM"
);
