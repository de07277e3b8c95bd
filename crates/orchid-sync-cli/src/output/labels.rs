// SPDX-License-Identifier: Apache-2.0

use console::style;
use std::io::{self, Write};

use crate::cli::OutputContext;
use crate::commands::types::{LabelsEnsureResult, LabelsReconcileResult};

use super::Renderable;

impl Renderable for LabelsEnsureResult {
    fn render_text(&self, w: &mut dyn Write, ctx: &OutputContext) -> io::Result<()> {
        writeln!(w)?;
        if self.created.is_empty() {
            writeln!(
                w,
                "{} All {} managed labels already exist in {}",
                style("*").green().bold(),
                self.total,
                style(&self.repo).cyan()
            )?;
        } else {
            writeln!(
                w,
                "{} Created {} of {} managed labels in {}",
                style("*").green().bold(),
                self.created.len(),
                self.total,
                style(&self.repo).cyan()
            )?;
            if ctx.verbose {
                for name in &self.created {
                    writeln!(w, "  + {name}")?;
                }
            }
        }
        writeln!(w)?;
        Ok(())
    }
}

impl Renderable for LabelsReconcileResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        writeln!(w)?;
        writeln!(
            w,
            "{} Labels reconciled on {}#{}",
            style("*").green().bold(),
            style(&self.repo).cyan(),
            self.number
        )?;
        if self.labels.is_empty() {
            writeln!(w, "  {}", style("(no labels)").dim())?;
        }
        for name in &self.labels {
            writeln!(w, "  - {name}")?;
        }
        writeln!(w)?;
        Ok(())
    }
}
