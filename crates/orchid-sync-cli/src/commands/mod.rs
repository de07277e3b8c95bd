// SPDX-License-Identifier: Apache-2.0

//! Command handlers for the Orchid Sync CLI.

pub mod auth;
pub mod labels;
pub mod types;

use anyhow::Result;
use orchid_sync::SyncConfig;

use crate::cli::{AuthCommand, Commands, LabelsCommand, OutputContext};
use crate::output;

/// Dispatch to the appropriate command handler.
pub async fn run(command: Commands, ctx: OutputContext, config: &SyncConfig) -> Result<()> {
    match command {
        Commands::Auth(AuthCommand::Check) => {
            let result = auth::run_check(&config.github).await?;
            output::render(&result, &ctx)
        }

        Commands::Labels(labels_cmd) => match labels_cmd {
            LabelsCommand::Ensure { repo } => {
                let result = labels::run_ensure(&config.github, repo.as_deref()).await?;
                output::render(&result, &ctx)
            }
            LabelsCommand::Reconcile {
                number,
                status,
                severity,
                repo,
            } => {
                let result =
                    labels::run_reconcile(&config.github, repo.as_deref(), number, status, severity)
                        .await?;
                output::render(&result, &ctx)
            }
        },
    }
}
