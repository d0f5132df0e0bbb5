use crate::domain::notice::{Notice, NoticeFilter, NoticeId};
use crate::domain::notification::Notification;
use crate::domain::stats::{CategoryStat, MonthlyStat, PriorityStat};
use crate::domain::user::{RecipientQuery, UserId};
use crate::repository::errors::RepositoryError;

#[cfg_attr(test, mockall::automock)]
pub trait NoticeRepository: Send + Sync {
    async fn create(&self, notice: &Notice) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: NoticeId) -> Result<Option<Notice>, RepositoryError>;
    async fn find_page(
        &self,
        filter: &NoticeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notice>, RepositoryError>;
    async fn count(&self, filter: &NoticeFilter) -> Result<i64, RepositoryError>;
    async fn update(&self, notice: &Notice) -> Result<(), RepositoryError>;
    async fn increment_views(&self, id: NoticeId) -> Result<(), RepositoryError>;
    async fn delete(&self, id: NoticeId) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait NoticeStatsRepository: Send + Sync {
    async fn category_stats(&self, teacher_id: UserId) -> Result<Vec<CategoryStat>, RepositoryError>;
    async fn priority_stats(&self, teacher_id: UserId) -> Result<Vec<PriorityStat>, RepositoryError>;
    async fn monthly_stats(&self, teacher_id: UserId) -> Result<Vec<MonthlyStat>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn find_student_ids(&self, query: &RecipientQuery) -> Result<Vec<UserId>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait NotificationRepository: Send + Sync {
    async fn create_many(&self, notifications: &[Notification]) -> Result<u64, RepositoryError>;
}
