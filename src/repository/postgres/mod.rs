use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};

use crate::{
    domain::notice::{Notice, NoticeFilter, NoticeId},
    domain::notification::Notification,
    domain::stats::{CategoryStat, MonthlyStat, PriorityStat},
    domain::user::{RecipientQuery, UserId},
    repository::errors::RepositoryError,
    usecase::contracts::{
        NoticeRepository, NoticeStatsRepository, NotificationRepository, UserRepository,
    },
};

const NOTICE_COLUMNS: &str = r#"
    n.id, n.title, n.content, n.category, n.branch, n.year,
    n.target_branches, n.target_years, n.teacher_id, u.name AS teacher_name,
    n.scheduled_for, n.priority, n.attachment, n.is_published, n.views,
    n.created_at, n.updated_at
"#;

// Binds: $1 category, $2 branch, $3 year, $4 teacher_id, $5 search pattern.
// A branch or year filter also matches notices addressed to 'All'.
const NOTICE_FILTER: &str = r#"
    ($1::notice_category IS NULL OR n.category = $1)
    AND ($2::text IS NULL OR $2 = ANY(n.target_branches) OR 'All' = ANY(n.target_branches))
    AND ($3::text IS NULL OR $3 = ANY(n.target_years) OR 'All' = ANY(n.target_years))
    AND ($4::uuid IS NULL OR n.teacher_id = $4)
    AND ($5::text IS NULL OR n.title ILIKE $5 OR n.content ILIKE $5)
"#;

// Seven columns per row keeps each statement well under the 65535 bind limit.
const NOTIFICATION_CHUNK: usize = 5000;

/// Wraps free text in `%` after escaping LIKE metacharacters.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub struct PostgresNoticeRepository {
    pool: PgPool,
}

impl PostgresNoticeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NoticeRepository for PostgresNoticeRepository {
    #[tracing::instrument(skip(self, notice), fields(notice_id = %notice.id, teacher_id = %notice.teacher_id))]
    async fn create(&self, notice: &Notice) -> Result<(), RepositoryError> {
        tracing::debug!("creating notice");

        sqlx::query(
            r#"
            INSERT INTO notices (
                id, title, content, category, branch, year, target_branches, target_years,
                teacher_id, scheduled_for, priority, attachment, is_published, views,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(notice.id)
        .bind(&notice.title)
        .bind(&notice.content)
        .bind(notice.category)
        .bind(&notice.branch)
        .bind(&notice.year)
        .bind(&notice.target_audience.branches)
        .bind(&notice.target_audience.years)
        .bind(notice.teacher_id)
        .bind(notice.scheduled_for)
        .bind(notice.priority)
        .bind(&notice.attachment)
        .bind(notice.is_published)
        .bind(notice.views)
        .bind(notice.created_at)
        .bind(notice.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(notice_id = %notice.id, "notice created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(notice_id = %id))]
    async fn find_by_id(&self, id: NoticeId) -> Result<Option<Notice>, RepositoryError> {
        tracing::debug!("finding notice by id");

        let query = format!(
            r#"
            SELECT {}
            FROM notices n
            LEFT JOIN users u ON u.id = n.teacher_id
            WHERE n.id = $1
            "#,
            NOTICE_COLUMNS
        );

        let notice = sqlx::query_as::<_, Notice>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(notice)
    }

    #[tracing::instrument(skip(self, filter), fields(%limit, %offset))]
    async fn find_page(
        &self,
        filter: &NoticeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notice>, RepositoryError> {
        tracing::debug!(?filter, "finding notices page");

        let query = format!(
            r#"
            SELECT {}
            FROM notices n
            LEFT JOIN users u ON u.id = n.teacher_id
            WHERE {}
            ORDER BY n.created_at DESC
            LIMIT $6 OFFSET $7
            "#,
            NOTICE_COLUMNS, NOTICE_FILTER
        );

        let notices = sqlx::query_as::<_, Notice>(&query)
            .bind(filter.category)
            .bind(filter.branch.as_deref())
            .bind(filter.year.as_deref())
            .bind(filter.teacher_id)
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(count = notices.len(), "found notices");
        Ok(notices)
    }

    #[tracing::instrument(skip(self, filter))]
    async fn count(&self, filter: &NoticeFilter) -> Result<i64, RepositoryError> {
        tracing::debug!(?filter, "counting notices");

        let query = format!("SELECT COUNT(*) FROM notices n WHERE {}", NOTICE_FILTER);

        let count: (i64,) = sqlx::query_as(&query)
            .bind(filter.category)
            .bind(filter.branch.as_deref())
            .bind(filter.year.as_deref())
            .bind(filter.teacher_id)
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(count = count.0, "counted notices");
        Ok(count.0)
    }

    #[tracing::instrument(skip(self, notice), fields(notice_id = %notice.id))]
    async fn update(&self, notice: &Notice) -> Result<(), RepositoryError> {
        tracing::debug!("updating notice");

        let result = sqlx::query(
            r#"
            UPDATE notices
            SET title = $2, content = $3, category = $4, branch = $5, year = $6,
                target_branches = $7, target_years = $8, scheduled_for = $9, priority = $10,
                attachment = $11, is_published = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(notice.id)
        .bind(&notice.title)
        .bind(&notice.content)
        .bind(notice.category)
        .bind(&notice.branch)
        .bind(&notice.year)
        .bind(&notice.target_audience.branches)
        .bind(&notice.target_audience.years)
        .bind(notice.scheduled_for)
        .bind(notice.priority)
        .bind(&notice.attachment)
        .bind(notice.is_published)
        .bind(notice.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(notice_id = %notice.id, "notice updated successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(notice_id = %id))]
    async fn increment_views(&self, id: NoticeId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE notices SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(notice_id = %id))]
    async fn delete(&self, id: NoticeId) -> Result<(), RepositoryError> {
        tracing::debug!("deleting notice");

        let result = sqlx::query(
            r#"
            DELETE FROM notices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(notice_id = %id, "notice deleted successfully");
        Ok(())
    }
}

impl NoticeStatsRepository for PostgresNoticeRepository {
    #[tracing::instrument(skip(self), fields(teacher_id = %teacher_id))]
    async fn category_stats(&self, teacher_id: UserId) -> Result<Vec<CategoryStat>, RepositoryError> {
        let stats = sqlx::query_as::<_, CategoryStat>(
            r#"
            SELECT category, COUNT(*) AS count, COALESCE(SUM(views), 0)::BIGINT AS total_views
            FROM notices
            WHERE teacher_id = $1
            GROUP BY category
            ORDER BY count DESC
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(groups = stats.len(), "category stats computed");
        Ok(stats)
    }

    #[tracing::instrument(skip(self), fields(teacher_id = %teacher_id))]
    async fn priority_stats(&self, teacher_id: UserId) -> Result<Vec<PriorityStat>, RepositoryError> {
        let stats = sqlx::query_as::<_, PriorityStat>(
            r#"
            SELECT priority, COUNT(*) AS count
            FROM notices
            WHERE teacher_id = $1
            GROUP BY priority
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(groups = stats.len(), "priority stats computed");
        Ok(stats)
    }

    #[tracing::instrument(skip(self), fields(teacher_id = %teacher_id))]
    async fn monthly_stats(&self, teacher_id: UserId) -> Result<Vec<MonthlyStat>, RepositoryError> {
        let stats = sqlx::query_as::<_, MonthlyStat>(
            r#"
            SELECT EXTRACT(YEAR FROM created_at)::INT AS year,
                   EXTRACT(MONTH FROM created_at)::INT AS month,
                   COUNT(*) AS count
            FROM notices
            WHERE teacher_id = $1
            GROUP BY 1, 2
            ORDER BY 1, 2
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(groups = stats.len(), "monthly stats computed");
        Ok(stats)
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for PostgresUserRepository {
    #[tracing::instrument(skip(self))]
    async fn find_student_ids(&self, query: &RecipientQuery) -> Result<Vec<UserId>, RepositoryError> {
        tracing::debug!("finding matching students");

        let ids: Vec<UserId> = sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE role = 'student'
              AND ($1::text[] IS NULL OR branch = ANY($1))
              AND ($2::text[] IS NULL OR year = ANY($2))
            "#,
        )
        .bind(query.branches.as_deref())
        .bind(query.years.as_deref())
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = ids.len(), "found matching students");
        Ok(ids)
    }
}

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for PostgresNotificationRepository {
    #[tracing::instrument(skip(self, notifications), fields(count = notifications.len()))]
    async fn create_many(&self, notifications: &[Notification]) -> Result<u64, RepositoryError> {
        tracing::debug!("bulk inserting notifications");

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in notifications.chunks(NOTIFICATION_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO notifications (id, user_id, notification_type, title, message, data, created_at) ",
            );
            builder.push_values(chunk, |mut row, n| {
                row.push_bind(n.id)
                    .push_bind(n.user_id)
                    .push_bind(n.notification_type.clone())
                    .push_bind(n.title.clone())
                    .push_bind(n.message.clone())
                    .push_bind(Json(n.data.clone()))
                    .push_bind(n.created_at);
            });

            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        tracing::debug!(inserted, "notifications inserted");
        Ok(inserted)
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
