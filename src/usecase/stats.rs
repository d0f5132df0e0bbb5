use crate::domain::stats::NoticeStats;
use crate::domain::user::UserId;
use crate::usecase::contracts::NoticeStatsRepository;
use crate::usecase::error::UsecaseError;

pub struct StatsUseCase<S>
where
    S: NoticeStatsRepository,
{
    stats_repository: S,
}

impl<S> StatsUseCase<S>
where
    S: NoticeStatsRepository,
{
    pub fn new(stats_repository: S) -> Self {
        Self { stats_repository }
    }

    /// Category, priority and monthly breakdowns of one teacher's notices.
    #[tracing::instrument(skip(self), fields(teacher_id = %teacher_id))]
    pub async fn notice_stats(&self, teacher_id: UserId) -> Result<NoticeStats, UsecaseError> {
        tracing::debug!("aggregating notice stats");

        let (category_stats, priority_stats, monthly_stats) = tokio::try_join!(
            self.stats_repository.category_stats(teacher_id),
            self.stats_repository.priority_stats(teacher_id),
            self.stats_repository.monthly_stats(teacher_id),
        )?;

        tracing::debug!(
            categories = category_stats.len(),
            priorities = priority_stats.len(),
            months = monthly_stats.len(),
            "notice stats aggregated"
        );
        Ok(NoticeStats {
            category_stats,
            priority_stats,
            monthly_stats,
        })
    }
}
