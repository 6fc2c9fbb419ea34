//! Detach a NIC from a virtual router.

use anyhow::Result;
use clap::Args;
use nebula_id::{NicId, RouterId};
use serde::Serialize;

use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct DetachCommand {
    /// Virtual router ID.
    router: RouterId,

    /// NIC ID to detach.
    nic: NicId,

    /// Seconds to wait for the VMs to settle and, separately, for the NIC to go away.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// Detach result.
#[derive(Debug, Serialize)]
struct DetachReceipt {
    router_id: RouterId,
    nic_id: NicId,
    detached: bool,
}

impl DetachCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let timeout = ctx.timeout(self.timeout_secs);

        ctx.reconciler()?
            .detach(self.router, self.nic, timeout)
            .await?;

        match ctx.format {
            OutputFormat::Table => print_success(&format!(
                "Detached NIC {} from virtual router {}",
                self.nic, self.router
            )),
            OutputFormat::Json => print_single(&DetachReceipt {
                router_id: self.router,
                nic_id: self.nic,
                detached: true,
            }),
        }
        Ok(())
    }
}
