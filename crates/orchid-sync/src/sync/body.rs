// SPDX-License-Identifier: Apache-2.0

//! Markdown composition for GitHub issues and comments.

use crate::model::{Issue, Reply, Severity};
use crate::utils::format_millis;

const MARKER_PREFIX: &str = "Orchid issue id: ";

/// The marker line embedded in a GitHub issue body.
#[must_use]
pub fn issue_marker(issue_id: &str) -> String {
    format!("{MARKER_PREFIX}{issue_id}")
}

/// Search query locating the GitHub issue created for `issue_id`.
#[must_use]
pub fn marker_search_query(issue_id: &str, repo: &str) -> String {
    format!("\"{}\" in:body is:issue repo:{repo}", issue_marker(issue_id))
}

/// Whether `body` carries the exact marker line for `issue_id`.
///
/// Full-text search tokenizes, so a query for `i1` may also return the issue
/// for `i10`; this rejects such near matches.
#[must_use]
pub fn has_marker(body: &str, issue_id: &str) -> bool {
    let marker = issue_marker(issue_id);
    body.lines().any(|line| line.trim() == marker)
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn is_severity_heading(line: &str) -> bool {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix("##") else {
        return false;
    };
    !rest.starts_with('#') && rest.trim().eq_ignore_ascii_case("severity")
}

/// Parses a legacy `## Severity` section.
///
/// The first non-empty line after the heading is matched case-insensitively
/// against the severity names. The section ends at the next heading.
#[must_use]
pub fn parse_severity_section(body: &str) -> Option<Severity> {
    let mut lines = body.lines().skip_while(|line| !is_severity_heading(line));
    lines.next()?;

    lines
        .take_while(|line| !is_heading(line))
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse().ok())
}

/// Removes a `## Severity` section (heading through the next heading) from `body`.
#[must_use]
pub fn strip_severity_section(body: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_section = false;
    for line in body.lines() {
        if is_severity_heading(line) {
            in_section = true;
            continue;
        }
        if in_section && is_heading(line) {
            in_section = false;
        }
        if !in_section {
            kept.push(line);
        }
    }
    kept.join("\n").trim().to_string()
}

/// Composes the GitHub issue body: cleaned local body plus a marker footer.
#[must_use]
pub fn compose_issue_body(issue: &Issue) -> String {
    let author = if issue.created_by.name.trim().is_empty() {
        "Unknown"
    } else {
        issue.created_by.name.as_str()
    };
    let footer = format!(
        "---\n{}\nCreated: {}\nAuthor: {author}",
        issue_marker(&issue.id),
        format_millis(issue.created_at),
    );

    let cleaned = strip_severity_section(&issue.body);
    if cleaned.is_empty() {
        footer
    } else {
        format!("{cleaned}\n\n{footer}")
    }
}

/// Composes the GitHub comment body for a reply.
#[must_use]
pub fn compose_reply_body(reply: &Reply) -> String {
    let author = if reply.author.name.trim().is_empty() {
        "Unknown"
    } else {
        reply.author.name.as_str()
    };
    format!("**{author}:**\n\n{}", reply.body)
}
