use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::user::{RecipientQuery, UserId};

/// Selector value that matches every branch or year.
pub const ALL: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct NoticeId(pub Uuid);

impl NoticeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NoticeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notice_category")]
pub enum NoticeCategory {
    #[default]
    General,
    Academic,
    Event,
    Important,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notice_priority")]
pub enum NoticePriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Branch and year selectors deciding which students hear about a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TargetAudience {
    #[sqlx(rename = "target_branches")]
    pub branches: Vec<String>,
    #[sqlx(rename = "target_years")]
    pub years: Vec<String>,
}

impl TargetAudience {
    /// Empty selector lists are stored as the wildcard.
    pub fn new(branches: Vec<String>, years: Vec<String>) -> Self {
        Self {
            branches: normalize(branches),
            years: normalize(years),
        }
    }

    pub fn from_flat(branch: Option<&str>, year: Option<&str>) -> Self {
        Self::new(
            branch.map(|b| vec![b.to_string()]).unwrap_or_default(),
            year.map(|y| vec![y.to_string()]).unwrap_or_default(),
        )
    }

    pub fn recipient_query(&self) -> RecipientQuery {
        RecipientQuery {
            branches: selector_filter(&self.branches),
            years: selector_filter(&self.years),
        }
    }
}

fn normalize(selectors: Vec<String>) -> Vec<String> {
    if selectors.is_empty() {
        vec![ALL.to_string()]
    } else {
        selectors
    }
}

fn selector_filter(selectors: &[String]) -> Option<Vec<String>> {
    if selectors.is_empty() || selectors.iter().any(|s| s == ALL) {
        None
    } else {
        Some(selectors.to_vec())
    }
}

fn validate_audience(audience: &TargetAudience) -> Result<(), ValidationError> {
    let blank = audience
        .branches
        .iter()
        .chain(audience.years.iter())
        .any(|s| s.trim().is_empty());

    if blank {
        return Err(ValidationError::new("blank_selector")
            .with_message("Target audience selectors cannot be blank".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Notice {
    pub id: NoticeId,
    pub title: String,
    pub content: String,
    pub category: NoticeCategory,
    pub branch: Option<String>,
    pub year: Option<String>,
    #[sqlx(flatten)]
    pub target_audience: TargetAudience,
    pub teacher_id: UserId,
    pub teacher_name: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: NoticePriority,
    pub attachment: Option<String>,
    pub is_published: bool,
    pub views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a teacher supplies when creating a notice.
#[derive(Debug, Clone, Validate)]
pub struct NoticeDraft {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 1000, message = "Content must be between 1 and 1000 characters"))]
    pub content: String,
    pub category: NoticeCategory,
    #[validate(length(min = 1, max = 50))]
    pub branch: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub year: Option<String>,
    #[validate(custom(function = "validate_audience"))]
    pub target_audience: Option<TargetAudience>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: NoticePriority,
    pub attachment: Option<String>,
}

/// Partial replacement applied by an update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Validate)]
pub struct NoticeChanges {
    #[validate(length(min = 1, max = 100, message = "Title must be between 1 and 100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "Content must be between 1 and 1000 characters"))]
    pub content: Option<String>,
    pub category: Option<NoticeCategory>,
    #[validate(length(min = 1, max = 50))]
    pub branch: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub year: Option<String>,
    #[validate(custom(function = "validate_audience"))]
    pub target_audience: Option<TargetAudience>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: Option<NoticePriority>,
    pub attachment: Option<String>,
    pub is_published: Option<bool>,
}

impl Notice {
    pub fn new(teacher_id: UserId, draft: NoticeDraft) -> Self {
        let now = Utc::now();
        let target_audience = match draft.target_audience {
            Some(audience) => TargetAudience::new(audience.branches, audience.years),
            None => TargetAudience::from_flat(draft.branch.as_deref(), draft.year.as_deref()),
        };

        Self {
            id: NoticeId::new(),
            title: draft.title,
            content: draft.content,
            category: draft.category,
            branch: draft.branch,
            year: draft.year,
            target_audience,
            teacher_id,
            teacher_name: None,
            is_published: draft.scheduled_for.is_none(),
            scheduled_for: draft.scheduled_for,
            priority: draft.priority,
            attachment: draft.attachment,
            views: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, changes: NoticeChanges) {
        let flat_changed = changes.branch.is_some() || changes.year.is_some();

        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(content) = changes.content {
            self.content = content;
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(branch) = changes.branch {
            self.branch = Some(branch);
        }
        if let Some(year) = changes.year {
            self.year = Some(year);
        }
        match changes.target_audience {
            Some(audience) => {
                self.target_audience = TargetAudience::new(audience.branches, audience.years);
            }
            None if flat_changed => {
                self.target_audience =
                    TargetAudience::from_flat(self.branch.as_deref(), self.year.as_deref());
            }
            None => {}
        }
        if let Some(scheduled_for) = changes.scheduled_for {
            self.scheduled_for = Some(scheduled_for);
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(attachment) = changes.attachment {
            self.attachment = Some(attachment);
        }
        if let Some(is_published) = changes.is_published {
            self.is_published = is_published;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoticeFilter {
    pub category: Option<NoticeCategory>,
    pub branch: Option<String>,
    pub year: Option<String>,
    pub teacher_id: Option<UserId>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NoticeDraft {
        NoticeDraft {
            title: "Mid-term exam schedule".to_string(),
            content: "Exams start on Monday.".to_string(),
            category: NoticeCategory::Academic,
            branch: None,
            year: None,
            target_audience: None,
            scheduled_for: None,
            priority: NoticePriority::High,
            attachment: None,
        }
    }

    #[test]
    fn test_notice_without_schedule_is_published() {
        let teacher_id = UserId(Uuid::new_v4());
        let notice = Notice::new(teacher_id, draft());

        assert!(notice.is_published);
        assert_eq!(notice.teacher_id, teacher_id);
        assert_eq!(notice.views, 0);
        assert_eq!(notice.created_at, notice.updated_at);
        assert_eq!(notice.target_audience, TargetAudience::new(vec![], vec![]));
        assert_eq!(notice.target_audience.branches, vec![ALL]);
    }

    #[test]
    fn test_scheduled_notice_starts_unpublished() {
        let mut scheduled = draft();
        scheduled.scheduled_for = Some(Utc::now() + chrono::Duration::days(2));

        let notice = Notice::new(UserId(Uuid::new_v4()), scheduled);

        assert!(!notice.is_published);
        assert!(notice.scheduled_for.is_some());
    }

    #[test]
    fn test_audience_derived_from_flat_branch_and_year() {
        let mut flat = draft();
        flat.branch = Some("CSE".to_string());
        flat.year = Some("2".to_string());

        let notice = Notice::new(UserId(Uuid::new_v4()), flat);

        assert_eq!(notice.target_audience.branches, vec!["CSE"]);
        assert_eq!(notice.target_audience.years, vec!["2"]);
    }

    #[test]
    fn test_explicit_audience_wins_over_flat_pair() {
        let mut targeted = draft();
        targeted.branch = Some("MECH".to_string());
        targeted.target_audience = Some(TargetAudience {
            branches: vec!["CSE".to_string(), "ECE".to_string()],
            years: vec![],
        });

        let notice = Notice::new(UserId(Uuid::new_v4()), targeted);

        assert_eq!(notice.target_audience.branches, vec!["CSE", "ECE"]);
        assert_eq!(notice.target_audience.years, vec![ALL]);
    }

    #[test]
    fn test_wildcard_audience_has_no_recipient_restriction() {
        let audience = TargetAudience::new(vec![ALL.to_string()], vec![ALL.to_string()]);

        assert_eq!(audience.recipient_query(), RecipientQuery::default());
    }

    #[test]
    fn test_wildcard_anywhere_in_selectors_lifts_restriction() {
        let audience = TargetAudience::new(
            vec!["CSE".to_string(), ALL.to_string()],
            vec!["3".to_string()],
        );
        let query = audience.recipient_query();

        assert_eq!(query.branches, None);
        assert_eq!(query.years, Some(vec!["3".to_string()]));
    }

    #[test]
    fn test_named_branches_restrict_recipients() {
        let audience = TargetAudience::new(vec!["CSE".to_string(), "ECE".to_string()], vec![]);
        let query = audience.recipient_query();

        assert_eq!(query.branches, Some(vec!["CSE".to_string(), "ECE".to_string()]));
        assert_eq!(query.years, None);
    }

    #[test]
    fn test_title_over_limit_fails_validation() {
        let mut long = draft();
        long.title = "a".repeat(101);

        let errors = long.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn test_blank_selector_fails_validation() {
        let mut blank = draft();
        blank.target_audience = Some(TargetAudience {
            branches: vec!["  ".to_string()],
            years: vec![],
        });

        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_apply_replaces_only_supplied_fields() {
        let mut notice = Notice::new(UserId(Uuid::new_v4()), draft());
        let original_updated_at = notice.updated_at;

        std::thread::sleep(std::time::Duration::from_millis(10));

        notice.apply(NoticeChanges {
            title: Some("Exam postponed".to_string()),
            priority: Some(NoticePriority::Low),
            ..Default::default()
        });

        assert_eq!(notice.title, "Exam postponed");
        assert_eq!(notice.content, "Exams start on Monday.");
        assert_eq!(notice.priority, NoticePriority::Low);
        assert_eq!(notice.category, NoticeCategory::Academic);
        assert!(notice.updated_at > original_updated_at);
    }

    #[test]
    fn test_apply_flat_branch_rederives_audience() {
        let mut notice = Notice::new(UserId(Uuid::new_v4()), draft());

        notice.apply(NoticeChanges {
            branch: Some("ECE".to_string()),
            ..Default::default()
        });

        assert_eq!(notice.target_audience.branches, vec!["ECE"]);
        assert_eq!(notice.target_audience.years, vec![ALL]);
    }

    #[test]
    fn test_changes_validated_like_draft() {
        let changes = NoticeChanges {
            content: Some("x".repeat(1001)),
            ..Default::default()
        };

        assert!(changes.validate().is_err());
        assert!(NoticeChanges::default().validate().is_ok());
    }
}
