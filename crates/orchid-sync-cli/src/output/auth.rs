// SPDX-License-Identifier: Apache-2.0

use console::style;
use std::io::{self, Write};

use crate::cli::OutputContext;
use crate::commands::types::AuthCheckResult;

use super::Renderable;

impl Renderable for AuthCheckResult {
    fn render_text(&self, w: &mut dyn Write, _ctx: &OutputContext) -> io::Result<()> {
        writeln!(w)?;
        writeln!(w, "{} Credentials accepted by GitHub", style("*").green().bold())?;
        writeln!(w, "  Method: {}", style(self.method).cyan())?;
        if let Some(installation_id) = self.installation_id {
            writeln!(w, "  Installation: {}", style(installation_id).cyan())?;
        }
        match self.expires_at {
            Some(expires_at) => writeln!(
                w,
                "  Token expires: {}",
                style(expires_at.to_rfc3339()).cyan()
            )?,
            None => writeln!(w, "  Token expires: {}", style("never").dim())?,
        }
        writeln!(w)?;
        Ok(())
    }
}
