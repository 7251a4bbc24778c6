//! Argument resolution for plan, canvas and milestone references.
//!
//! - Plans and canvases are addressed by UUID.
//! - Milestones are addressed by UUID or by week number within a plan
//!   (`5` or `w5`), since week numbers never change on reorder.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use uuid::Uuid;

use pathway_db::models::{CanvasSection, Milestone};

/// Parse a UUID argument, naming the kind of record in the error.
pub fn parse_id(kind: &str, input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).with_context(|| format!("invalid {kind} ID: {input:?}"))
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date: {input:?} (expected YYYY-MM-DD)"))
}

/// Resolve a milestone reference against a plan's milestones.
pub fn resolve_milestone(milestones: &[Milestone], input: &str) -> Result<Uuid> {
    let input = input.trim();
    if let Ok(id) = Uuid::parse_str(input) {
        return match milestones.iter().find(|m| m.id == id) {
            Some(m) => Ok(m.id),
            None => bail!("milestone {id} is not part of this plan"),
        };
    }

    let digits = input
        .strip_prefix('w')
        .or_else(|| input.strip_prefix('W'))
        .unwrap_or(input);
    let week: i32 = digits
        .parse()
        .with_context(|| format!("invalid milestone reference: {input:?} (use a UUID or week number)"))?;
    match milestones.iter().find(|m| m.week_number == week) {
        Some(m) => Ok(m.id),
        None => bail!("no milestone for week {week}"),
    }
}

/// Resolve a full ordering of milestone references.
pub fn resolve_ordering(milestones: &[Milestone], inputs: &[String]) -> Result<Vec<Uuid>> {
    inputs
        .iter()
        .map(|input| resolve_milestone(milestones, input))
        .collect()
}

/// Parse a `section=text` assignment, e.g. `target_role=Staff engineer`.
pub fn parse_section_assignment(input: &str) -> Result<(CanvasSection, String)> {
    let Some((name, text)) = input.split_once('=') else {
        bail!("invalid section assignment: {input:?} (expected section=text)");
    };
    let section: CanvasSection = name.trim().parse()?;
    Ok((section, text.to_string()))
}
