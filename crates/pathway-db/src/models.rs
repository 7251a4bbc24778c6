use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Every plan owns exactly this many milestones, one per week.
pub const MILESTONES_PER_PLAN: usize = 12;

/// A plan spans twelve weeks: `end_date = start_date + PLAN_LENGTH_DAYS`.
pub const PLAN_LENGTH_DAYS: u64 = 84;

/// Hard cap on milestone goal text, counted in characters.
pub const MAX_GOAL_CHARS: usize = 200;

/// Number of free-text sections on a canvas.
pub const CANVAS_SECTION_COUNT: usize = 9;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Review state of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
        };
        f.write_str(s)
    }
}

impl FromStr for SubmissionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "under_review" => Ok(Self::UnderReview),
            "approved" => Ok(Self::Approved),
            other => Err(ParseEnumError::new("submission status", other)),
        }
    }
}

/// Progress state of a single milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

impl FromStr for MilestoneStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(ParseEnumError::new("milestone status", other)),
        }
    }
}

/// Error returned when parsing an unknown enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `plans` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub submission_status: SubmissionStatus,
    pub parent_plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `milestones` table.
///
/// `week_number` (1..=12) is fixed at creation. `order_index` (0..=11) is
/// the display position and changes independently on reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Milestone {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub week_number: i32,
    pub order_index: i32,
    pub goal: String,
    pub notes: String,
    pub status: MilestoneStatus,
    pub updated_at: DateTime<Utc>,
}

/// A plan joined with its milestones, sorted by `order_index` ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWithMilestones {
    pub plan: Plan,
    pub milestones: Vec<Milestone>,
}

impl PlanWithMilestones {
    /// Milestone ids in display order.
    pub fn ordered_ids(&self) -> Vec<Uuid> {
        self.milestones.iter().map(|m| m.id).collect()
    }
}

/// The nine free-text sections of a canvas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CanvasSections {
    pub present_role: String,
    pub target_role: String,
    pub motivation: String,
    pub strengths: String,
    pub skill_gaps: String,
    pub experience_gaps: String,
    pub resources: String,
    pub obstacles: String,
    pub success_metrics: String,
}

/// Names one of the nine canvas sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanvasSection {
    PresentRole,
    TargetRole,
    Motivation,
    Strengths,
    SkillGaps,
    ExperienceGaps,
    Resources,
    Obstacles,
    SuccessMetrics,
}

impl CanvasSection {
    pub const ALL: [CanvasSection; CANVAS_SECTION_COUNT] = [
        Self::PresentRole,
        Self::TargetRole,
        Self::Motivation,
        Self::Strengths,
        Self::SkillGaps,
        Self::ExperienceGaps,
        Self::Resources,
        Self::Obstacles,
        Self::SuccessMetrics,
    ];

    /// Column / wire name of the section.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PresentRole => "present_role",
            Self::TargetRole => "target_role",
            Self::Motivation => "motivation",
            Self::Strengths => "strengths",
            Self::SkillGaps => "skill_gaps",
            Self::ExperienceGaps => "experience_gaps",
            Self::Resources => "resources",
            Self::Obstacles => "obstacles",
            Self::SuccessMetrics => "success_metrics",
        }
    }
}

impl fmt::Display for CanvasSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanvasSection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("canvas section", s))
    }
}

impl CanvasSections {
    pub fn get(&self, section: CanvasSection) -> &str {
        match section {
            CanvasSection::PresentRole => &self.present_role,
            CanvasSection::TargetRole => &self.target_role,
            CanvasSection::Motivation => &self.motivation,
            CanvasSection::Strengths => &self.strengths,
            CanvasSection::SkillGaps => &self.skill_gaps,
            CanvasSection::ExperienceGaps => &self.experience_gaps,
            CanvasSection::Resources => &self.resources,
            CanvasSection::Obstacles => &self.obstacles,
            CanvasSection::SuccessMetrics => &self.success_metrics,
        }
    }

    pub fn set(&mut self, section: CanvasSection, text: impl Into<String>) {
        let slot = match section {
            CanvasSection::PresentRole => &mut self.present_role,
            CanvasSection::TargetRole => &mut self.target_role,
            CanvasSection::Motivation => &mut self.motivation,
            CanvasSection::Strengths => &mut self.strengths,
            CanvasSection::SkillGaps => &mut self.skill_gaps,
            CanvasSection::ExperienceGaps => &mut self.experience_gaps,
            CanvasSection::Resources => &mut self.resources,
            CanvasSection::Obstacles => &mut self.obstacles,
            CanvasSection::SuccessMetrics => &mut self.success_metrics,
        };
        *slot = text.into();
    }

    /// Number of sections holding non-whitespace text.
    pub fn filled_count(&self) -> usize {
        CanvasSection::ALL
            .into_iter()
            .filter(|s| !self.get(*s).trim().is_empty())
            .count()
    }
}

/// A row from the `canvases` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Canvas {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub position: i32,
    #[sqlx(flatten)]
    pub sections: CanvasSections,
    pub completion_percentage: i32,
    pub plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Write inputs
// ---------------------------------------------------------------------------

/// Input for inserting a plan together with its twelve milestones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlan {
    pub owner_id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub parent_plan_id: Option<Uuid>,
}

/// Seed values for the milestones of a fresh plan: `(week_number,
/// order_index)` with `order_index = week_number - 1`.
pub fn milestone_seeds() -> impl Iterator<Item = (i32, i32)> {
    (1..=MILESTONES_PER_PLAN as i32).map(|week| (week, week - 1))
}

/// Partial milestone update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestonePatch {
    pub goal: Option<String>,
    pub notes: Option<String>,
    pub status: Option<MilestoneStatus>,
    pub order_index: Option<i32>,
}

impl MilestonePatch {
    pub fn goal(text: impl Into<String>) -> Self {
        Self {
            goal: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn notes(text: impl Into<String>) -> Self {
        Self {
            notes: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn status(status: MilestoneStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.goal.is_none()
            && self.notes.is_none()
            && self.status.is_none()
            && self.order_index.is_none()
    }
}

/// Partial plan metadata update. A new start date always comes with its
/// recomputed end date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanDetailsPatch {
    pub title: Option<String>,
    pub dates: Option<(NaiveDate, NaiveDate)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_status_round_trips_through_strings() {
        for status in [
            SubmissionStatus::Draft,
            SubmissionStatus::Submitted,
            SubmissionStatus::UnderReview,
            SubmissionStatus::Approved,
        ] {
            assert_eq!(status.to_string().parse::<SubmissionStatus>(), Ok(status));
        }
        let err = "pending".parse::<SubmissionStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid submission status: \"pending\"");
    }

    #[test]
    fn milestone_status_parses_snake_case() {
        assert_eq!(
            "in_progress".parse::<MilestoneStatus>(),
            Ok(MilestoneStatus::InProgress)
        );
        assert!("InProgress".parse::<MilestoneStatus>().is_err());
    }

    #[test]
    fn milestone_seeds_cover_every_week_once() {
        let seeds: Vec<_> = milestone_seeds().collect();
        assert_eq!(seeds.len(), MILESTONES_PER_PLAN);
        assert_eq!(seeds.first(), Some(&(1, 0)));
        assert_eq!(seeds.last(), Some(&(12, 11)));
        assert!(seeds.iter().all(|(week, order)| *order == week - 1));
    }

    #[test]
    fn filled_count_ignores_whitespace() {
        let mut sections = CanvasSections::default();
        assert_eq!(sections.filled_count(), 0);
        sections.set(CanvasSection::TargetRole, "Staff engineer");
        sections.set(CanvasSection::Motivation, "   \n");
        sections.set(CanvasSection::Obstacles, "time");
        assert_eq!(sections.filled_count(), 2);
        assert_eq!(sections.get(CanvasSection::Obstacles), "time");
    }

    #[test]
    fn canvas_section_names_parse() {
        for section in CanvasSection::ALL {
            assert_eq!(section.as_str().parse::<CanvasSection>(), Ok(section));
        }
        assert!("summary".parse::<CanvasSection>().is_err());
    }

    #[test]
    fn empty_patch_detection() {
        assert!(MilestonePatch::default().is_empty());
        assert!(!MilestonePatch::goal("").is_empty());
    }
}
