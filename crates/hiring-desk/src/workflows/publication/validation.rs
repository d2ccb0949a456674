use chrono::{DateTime, Utc};

use super::domain::{JobPosting, ValidationResult};

pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const REQUIRED_SKILLS: &str = "required_skills";
pub const SALARY_RANGE: &str = "salary_range";
pub const APPLICATION_DEADLINE: &str = "application_deadline";

/// Completeness gate run before any state change. Takes the clock as input so the
/// verdict is a pure function of its arguments.
pub fn validate(posting: &JobPosting, now: DateTime<Utc>) -> ValidationResult {
    let mut missing_fields = Vec::new();

    if is_blank(posting.title.as_deref()) {
        missing_fields.push(TITLE.to_string());
    }

    if is_blank(posting.description.as_deref()) {
        missing_fields.push(DESCRIPTION.to_string());
    }

    if !posting
        .required_skills
        .iter()
        .any(|skill| !skill.trim().is_empty())
    {
        missing_fields.push(REQUIRED_SKILLS.to_string());
    }

    if let (Some(min), Some(max)) = (posting.salary_min, posting.salary_max) {
        if min > max {
            missing_fields.push(SALARY_RANGE.to_string());
        }
    }

    if posting
        .application_deadline
        .is_some_and(|deadline| deadline < now)
    {
        missing_fields.push(APPLICATION_DEADLINE.to_string());
    }

    ValidationResult {
        is_valid: missing_fields.is_empty(),
        missing_fields,
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |text| text.trim().is_empty())
}
