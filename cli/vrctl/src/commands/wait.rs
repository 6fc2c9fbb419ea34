//! Wait for VMs to settle.

use anyhow::Result;
use clap::Args;
use nebula_id::VmId;
use nebula_reconcile::{GateError, InstanceState, NIC_UPDATE_READY_STATES};
use serde::Serialize;

use crate::error::CliError;
use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct WaitCommand {
    /// VM IDs to wait for.
    #[arg(required = true)]
    vms: Vec<VmId>,

    /// Accepted state (repeatable). Defaults to RUNNING, POWEROFF and DONE.
    #[arg(long = "state", value_name = "STATE")]
    states: Vec<InstanceState>,

    /// Seconds to wait before giving up.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// Wait result.
#[derive(Debug, Serialize)]
struct WaitReceipt {
    vms: Vec<VmId>,
    states: Vec<InstanceState>,
    ready: bool,
}

impl WaitCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let allowed = if self.states.is_empty() {
            NIC_UPDATE_READY_STATES.to_vec()
        } else {
            self.states
        };
        let timeout = ctx.timeout(self.timeout_secs);

        ctx.reconciler()?
            .wait_ready(&self.vms, &allowed, timeout)
            .await
            .map_err(|err| match err {
                GateError::Blocked(blocked) => CliError::NotReady {
                    allowed: allowed.clone(),
                    blocked,
                },
                GateError::Cancelled => CliError::Cancelled,
            })?;

        match ctx.format {
            OutputFormat::Table => {
                print_success(&format!("{} VM(s) ready", self.vms.len()))
            }
            OutputFormat::Json => print_single(&WaitReceipt {
                vms: self.vms,
                states: allowed,
                ready: true,
            }),
        }
        Ok(())
    }
}
