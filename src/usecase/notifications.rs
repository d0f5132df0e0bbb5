use anyhow::Error;

use crate::domain::notice::Notice;
use crate::domain::notification::Notification;
use crate::usecase::contracts::{NotificationRepository, UserRepository};

/// Outcome of a fan-out. Callers log or ignore it; it never fails their request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutStatus {
    Delivered(usize),
    Failed,
}

pub struct NotificationFanOut<U, N>
where
    U: UserRepository,
    N: NotificationRepository,
{
    user_repository: U,
    notification_repository: N,
}

impl<U, N> NotificationFanOut<U, N>
where
    U: UserRepository,
    N: NotificationRepository,
{
    pub fn new(user_repository: U, notification_repository: N) -> Self {
        Self {
            user_repository,
            notification_repository,
        }
    }

    #[tracing::instrument(skip(self, notice), fields(notice_id = %notice.id))]
    pub async fn notice_posted(&self, notice: &Notice) -> FanOutStatus {
        match self.deliver(notice).await {
            Ok(delivered) => {
                metrics::counter!("notice_notifications_created_total").increment(delivered as u64);
                tracing::info!(notice_id = %notice.id, delivered, "notice notifications created");
                FanOutStatus::Delivered(delivered)
            }
            Err(e) => {
                metrics::counter!("notice_fanout_failures_total").increment(1);
                tracing::error!(notice_id = %notice.id, error = %e, "failed to fan out notice notifications");
                FanOutStatus::Failed
            }
        }
    }

    async fn deliver(&self, notice: &Notice) -> Result<usize, Error> {
        let query = notice.target_audience.recipient_query();
        tracing::debug!(?query, "resolving notice recipients");

        let recipients = self.user_repository.find_student_ids(&query).await?;
        if recipients.is_empty() {
            tracing::debug!("no matching students, nothing to deliver");
            return Ok(0);
        }

        let notifications: Vec<Notification> = recipients
            .into_iter()
            .map(|recipient| Notification::notice_posted(recipient, notice))
            .collect();

        self.notification_repository.create_many(&notifications).await?;
        Ok(notifications.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notice::{NoticeCategory, NoticeDraft, NoticePriority, TargetAudience};
    use crate::domain::user::UserId;
    use crate::repository::errors::RepositoryError;
    use crate::usecase::contracts::{MockNotificationRepository, MockUserRepository};
    use uuid::Uuid;

    fn notice(target_audience: Option<TargetAudience>) -> Notice {
        Notice::new(
            UserId(Uuid::new_v4()),
            NoticeDraft {
                title: "Hackathon registration open".to_string(),
                content: "Register by Friday.".to_string(),
                category: NoticeCategory::Event,
                branch: None,
                year: None,
                target_audience,
                scheduled_for: None,
                priority: NoticePriority::Medium,
                attachment: None,
            },
        )
    }

    fn students(n: usize) -> Vec<UserId> {
        (0..n).map(|_| UserId(Uuid::new_v4())).collect()
    }

    #[tokio::test]
    async fn test_one_notification_per_student() {
        let mut mock_users = MockUserRepository::new();
        let mut mock_notifications = MockNotificationRepository::new();
        let recipients = students(3);
        let expected = recipients.clone();

        mock_users
            .expect_find_student_ids()
            .times(1)
            .returning(move |_| Ok(recipients.clone()));

        mock_notifications
            .expect_create_many()
            .withf(move |notifications| {
                notifications.len() == 3
                    && notifications
                        .iter()
                        .zip(expected.iter())
                        .all(|(n, id)| n.user_id == *id && n.message == "Hackathon registration open")
            })
            .times(1)
            .returning(|notifications| Ok(notifications.len() as u64));

        let fan_out = NotificationFanOut::new(mock_users, mock_notifications);
        let status = fan_out.notice_posted(&notice(None)).await;

        assert_eq!(status, FanOutStatus::Delivered(3));
    }

    #[tokio::test]
    async fn test_all_wildcard_matches_every_branch() {
        let mut mock_users = MockUserRepository::new();
        let mut mock_notifications = MockNotificationRepository::new();

        mock_users
            .expect_find_student_ids()
            .withf(|query| query.branches.is_none() && query.years.is_none())
            .times(1)
            .returning(|_| Ok(students(2)));
        mock_notifications
            .expect_create_many()
            .times(1)
            .returning(|_| Ok(2));

        let audience = TargetAudience::new(vec!["All".to_string()], vec!["All".to_string()]);
        let fan_out = NotificationFanOut::new(mock_users, mock_notifications);

        assert_eq!(fan_out.notice_posted(&notice(Some(audience))).await, FanOutStatus::Delivered(2));
    }

    #[tokio::test]
    async fn test_named_branches_narrow_recipients() {
        let mut mock_users = MockUserRepository::new();
        let mut mock_notifications = MockNotificationRepository::new();

        mock_users
            .expect_find_student_ids()
            .withf(|query| {
                query.branches == Some(vec!["CSE".to_string(), "ECE".to_string()])
                    && query.years.is_none()
            })
            .times(1)
            .returning(|_| Ok(students(1)));
        mock_notifications
            .expect_create_many()
            .times(1)
            .returning(|_| Ok(1));

        let audience = TargetAudience::new(vec!["CSE".to_string(), "ECE".to_string()], vec![]);
        let fan_out = NotificationFanOut::new(mock_users, mock_notifications);

        assert_eq!(fan_out.notice_posted(&notice(Some(audience))).await, FanOutStatus::Delivered(1));
    }

    #[tokio::test]
    async fn test_no_recipients_skips_insert() {
        let mut mock_users = MockUserRepository::new();
        let mut mock_notifications = MockNotificationRepository::new();

        mock_users
            .expect_find_student_ids()
            .times(1)
            .returning(|_| Ok(vec![]));
        mock_notifications.expect_create_many().times(0);

        let fan_out = NotificationFanOut::new(mock_users, mock_notifications);

        assert_eq!(fan_out.notice_posted(&notice(None)).await, FanOutStatus::Delivered(0));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_contained() {
        let mut mock_users = MockUserRepository::new();
        let mut mock_notifications = MockNotificationRepository::new();

        mock_users
            .expect_find_student_ids()
            .times(1)
            .returning(|_| Err(RepositoryError::DatabaseError("timeout".to_string())));
        mock_notifications.expect_create_many().times(0);

        let fan_out = NotificationFanOut::new(mock_users, mock_notifications);

        assert_eq!(fan_out.notice_posted(&notice(None)).await, FanOutStatus::Failed);
    }

    #[tokio::test]
    async fn test_insert_failure_is_contained() {
        let mut mock_users = MockUserRepository::new();
        let mut mock_notifications = MockNotificationRepository::new();

        mock_users
            .expect_find_student_ids()
            .times(1)
            .returning(|_| Ok(students(4)));
        mock_notifications
            .expect_create_many()
            .times(1)
            .returning(|_| Err(RepositoryError::DatabaseError("disk full".to_string())));

        let fan_out = NotificationFanOut::new(mock_users, mock_notifications);

        assert_eq!(fan_out.notice_posted(&notice(None)).await, FanOutStatus::Failed);
    }
}
