use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::notice::{Notice, NoticeCategory, NoticeId, NoticePriority};
use crate::domain::user::UserId;

pub const NOTICE_POSTED: &str = "notice_posted";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticePostedData {
    pub notice_id: NoticeId,
    pub category: NoticeCategory,
    pub priority: NoticePriority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub data: NoticePostedData,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn notice_posted(recipient: UserId, notice: &Notice) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: recipient,
            notification_type: NOTICE_POSTED.to_string(),
            title: "New Notice".to_string(),
            message: notice.title.clone(),
            data: NoticePostedData {
                notice_id: notice.id,
                category: notice.category,
                priority: notice.priority,
            },
            created_at: Utc::now(),
        }
    }
}
