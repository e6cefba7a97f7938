//! Labels command.

use clap::Args;
use serde::Serialize;
use voicegate::SampleStore;

use super::{load_config, open_store, output_format};
use crate::output;
use crate::Cli;

/// List enrolled labels and their reference counts.
#[derive(Args)]
pub struct LabelsCommand {}

#[derive(Debug, Serialize)]
struct LabelInfo {
    label: String,
    role: &'static str,
    references: usize,
}

impl LabelsCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let owner = load_config(cli)?.decision.owner_label;
        let store = open_store(cli)?;
        let infos = list_labels(&store, &owner)?;
        output::print(&infos, output_format(cli))
    }
}

fn list_labels<S: SampleStore>(store: &S, owner: &str) -> anyhow::Result<Vec<LabelInfo>> {
    store
        .labels()?
        .into_iter()
        .map(|label| {
            let references = store.reference_waveforms(&label)?.len();
            let role = if label == owner { "owner" } else { "command" };
            Ok(LabelInfo {
                label,
                role,
                references,
            })
        })
        .collect()
}
