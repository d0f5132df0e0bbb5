use validator::Validate;

use crate::domain::notice::{Notice, NoticeChanges, NoticeDraft, NoticeFilter, NoticeId};
use crate::domain::user::Actor;
use crate::usecase::contracts::{NoticeRepository, NotificationRepository, UserRepository};
use crate::usecase::error::UsecaseError;
use crate::usecase::notifications::NotificationFanOut;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page whose offset still fits in an i64 at the largest page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Clamps to 1 <= page <= MAX_PAGE and 1 <= limit <= MAX_PAGE_SIZE.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoticePage {
    pub notices: Vec<Notice>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

pub struct NoticesUseCase<R, U, N>
where
    R: NoticeRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    notice_repository: R,
    fan_out: NotificationFanOut<U, N>,
}

impl<R, U, N> NoticesUseCase<R, U, N>
where
    R: NoticeRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    pub fn new(notice_repository: R, fan_out: NotificationFanOut<U, N>) -> Self {
        Self {
            notice_repository,
            fan_out,
        }
    }

    #[tracing::instrument(skip(self, draft), fields(teacher_id = %actor.id, category = ?draft.category))]
    pub async fn create_notice(&self, actor: &Actor, draft: NoticeDraft) -> Result<Notice, UsecaseError> {
        tracing::debug!("creating notice");

        draft.validate()?;

        let mut notice = Notice::new(actor.id, draft);
        self.notice_repository.create(&notice).await?;
        metrics::counter!("notices_created_total").increment(1);
        tracing::info!(notice_id = %notice.id, is_published = notice.is_published, "notice created");

        if notice.is_published {
            metrics::counter!("notices_published_total").increment(1);
            let status = self.fan_out.notice_posted(&notice).await;
            tracing::debug!(notice_id = %notice.id, ?status, "fan-out finished");
        }

        // Read back so the response carries the author's display name.
        match self.notice_repository.find_by_id(notice.id).await {
            Ok(Some(stored)) => notice = stored,
            Ok(None) => {
                tracing::warn!(notice_id = %notice.id, "created notice missing on read-back");
            }
            Err(e) => {
                tracing::warn!(notice_id = %notice.id, error = %e, "failed to read back created notice");
            }
        }

        Ok(notice)
    }

    #[tracing::instrument(skip(self), fields(page = pagination.page, limit = pagination.limit))]
    pub async fn list_notices(
        &self,
        filter: NoticeFilter,
        pagination: Pagination,
    ) -> Result<NoticePage, UsecaseError> {
        tracing::debug!(?filter, "listing notices");

        let total = self.notice_repository.count(&filter).await?;
        let notices = self
            .notice_repository
            .find_page(&filter, pagination.limit, pagination.offset())
            .await?;

        tracing::debug!(count = notices.len(), total, "notices listed");
        Ok(NoticePage {
            notices,
            total,
            page: pagination.page,
            total_pages: pagination.total_pages(total),
        })
    }

    #[tracing::instrument(skip(self), fields(notice_id = %id))]
    pub async fn get_notice(&self, id: NoticeId) -> Result<Notice, UsecaseError> {
        tracing::debug!("getting notice");

        let mut notice = self.find_existing(id).await?;

        self.notice_repository.increment_views(id).await?;
        notice.views += 1;

        Ok(notice)
    }

    #[tracing::instrument(skip(self, changes), fields(notice_id = %id, user_id = %actor.id, role = %actor.role))]
    pub async fn update_notice(
        &self,
        actor: &Actor,
        id: NoticeId,
        changes: Result<NoticeChanges, UsecaseError>,
    ) -> Result<Notice, UsecaseError> {
        tracing::debug!("updating notice");

        // Body errors surface only after existence and ownership are settled.
        let mut notice = self.find_existing(id).await?;
        ensure_can_manage(actor, &notice, "update")?;
        let changes = changes?;
        changes.validate()?;

        let was_published = notice.is_published;
        notice.apply(changes);
        self.notice_repository.update(&notice).await?;
        tracing::info!(notice_id = %id, "notice updated");

        if !was_published && notice.is_published {
            metrics::counter!("notices_published_total").increment(1);
            let status = self.fan_out.notice_posted(&notice).await;
            tracing::debug!(notice_id = %id, ?status, "fan-out finished");
        }

        Ok(notice)
    }

    #[tracing::instrument(skip(self), fields(notice_id = %id, user_id = %actor.id, role = %actor.role))]
    pub async fn delete_notice(&self, actor: &Actor, id: NoticeId) -> Result<(), UsecaseError> {
        tracing::debug!("deleting notice");

        let notice = self.find_existing(id).await?;
        ensure_can_manage(actor, &notice, "delete")?;

        if actor.id != notice.teacher_id {
            tracing::info!(notice_id = %id, admin_id = %actor.id, "privileged notice deletion");
        }

        self.notice_repository.delete(id).await?;

        tracing::info!(notice_id = %id, "notice deleted");
        Ok(())
    }

    async fn find_existing(&self, id: NoticeId) -> Result<Notice, UsecaseError> {
        self.notice_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Notice".to_string()))
    }
}

fn ensure_can_manage(actor: &Actor, notice: &Notice, action: &str) -> Result<(), UsecaseError> {
    if actor.can_manage(notice.teacher_id) {
        return Ok(());
    }

    tracing::warn!(
        notice_id = %notice.id,
        user_id = %actor.id,
        action,
        "unauthorized notice modification attempt"
    );
    Err(UsecaseError::Forbidden(format!(
        "Not authorized to {} this notice",
        action
    )))
}
