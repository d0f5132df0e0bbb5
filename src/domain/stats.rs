use serde::Serialize;

use crate::domain::notice::{NoticeCategory, NoticePriority};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub category: NoticeCategory,
    pub count: i64,
    pub total_views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PriorityStat {
    pub priority: NoticePriority,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MonthlyStat {
    pub year: i32,
    pub month: i32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeStats {
    pub category_stats: Vec<CategoryStat>,
    pub priority_stats: Vec<PriorityStat>,
    pub monthly_stats: Vec<MonthlyStat>,
}
