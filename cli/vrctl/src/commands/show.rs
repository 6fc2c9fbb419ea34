//! Show a virtual router.

use anyhow::Result;
use clap::Args;
use nebula_id::RouterId;
use nebula_reconcile::{NicDescriptor, RouterSnapshot};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_info, print_output, print_single, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Virtual router ID.
    router: RouterId,
}

impl ShowCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let snapshot = ctx.reconciler()?.snapshot(self.router).await?;

        match ctx.format {
            OutputFormat::Table => {
                print_output(&nic_rows(&snapshot), ctx.format);
                print_info(&format!("VMs: {}", display_vms(&snapshot)));
            }
            OutputFormat::Json => print_single(&snapshot),
        }
        Ok(())
    }
}

/// NIC row for table output.
#[derive(Debug, Serialize, Tabled)]
struct NicRow {
    #[tabled(rename = "NIC ID")]
    nic_id: String,

    #[tabled(rename = "Network")]
    network_id: String,

    #[tabled(rename = "Template")]
    template: String,
}

impl From<&NicDescriptor> for NicRow {
    fn from(nic: &NicDescriptor) -> Self {
        Self {
            nic_id: display_option(nic.nic_id()),
            network_id: display_option(nic.network_id()),
            template: nic.canonical(),
        }
    }
}

fn nic_rows(snapshot: &RouterSnapshot) -> Vec<NicRow> {
    snapshot.nics().iter().map(NicRow::from).collect()
}

fn display_option<T: ToString>(opt: Option<T>) -> String {
    opt.map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn display_vms(snapshot: &RouterSnapshot) -> String {
    if snapshot.vms().is_empty() {
        return "none".to_string();
    }
    snapshot
        .vms()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
