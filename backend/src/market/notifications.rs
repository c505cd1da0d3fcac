use super::Marketplace;
use super::adapter::{Clock, StorageAdapter};
use super::keys;
use crate::error::{MarketError, MarketResult};
use tripfin_shared::protocol::{ListNotificationsRequest, MarkAllReadResult};
use tripfin_shared::{Notification, NotificationPriority, NotificationType, User};

/// 已读通知保留天数
const READ_RETENTION_DAYS: i64 = 30;
/// 未读通知最长保留天数
const UNREAD_RETENTION_DAYS: i64 = 90;

impl<S, C> Marketplace<S, C>
where
    S: StorageAdapter,
    C: Clock,
{
    pub(super) async fn notify(
        &self,
        user_id: &str,
        kind: NotificationType,
        title: &str,
        message: String,
        priority: NotificationPriority,
        action_url: Option<String>,
    ) -> MarketResult<Notification> {
        let seq = self.next_seq("notif").await?;
        let notification = Notification {
            id: format!("{:012}", seq),
            user_id: user_id.to_string(),
            kind,
            title: title.to_string(),
            message,
            priority,
            action_url,
            read: false,
            created_at: self.now(),
        };
        self.storage
            .put(&keys::notification(user_id, seq), &notification)
            .await?;
        Ok(notification)
    }

    /// 最新的在前，最多 `limit` 条
    pub async fn notifications(&self, actor: &User, query: &ListNotificationsRequest) -> MarketResult<Vec<Notification>> {
        let prefix = keys::notifications(&actor.id);
        let limit = query.effective_limit();
        if !query.unread_only {
            let latest: Vec<(String, Notification)> = self.storage.list_latest(&prefix, limit).await?;
            return Ok(latest.into_iter().map(|(_, n)| n).collect());
        }

        let mut list: Vec<Notification> = self
            .storage
            .list(&prefix)
            .await?
            .into_iter()
            .map(|(_, n)| n)
            .filter(|n: &Notification| !n.read)
            .collect();
        list.reverse();
        list.truncate(limit);
        Ok(list)
    }

    /// 清理过期通知：已读超过 30 天、未读超过 90 天
    pub(super) async fn prune_notifications(&self) -> MarketResult<usize> {
        let now = self.now();
        let read_cutoff = now.add_days(-READ_RETENTION_DAYS);
        let unread_cutoff = now.add_days(-UNREAD_RETENTION_DAYS);
        let entries: Vec<(String, Notification)> = self.storage.list(keys::NOTIFICATION).await?;

        let mut pruned = 0;
        for (key, n) in entries {
            let cutoff = if n.read { read_cutoff } else { unread_cutoff };
            if n.created_at < cutoff {
                self.storage.delete(&key).await?;
                pruned += 1;
            }
        }
        if pruned > 0 {
            log_info!("[notifications] pruned {} old notification(s)", pruned);
        }
        Ok(pruned)
    }

    pub async fn mark_read(&self, actor: &User, notification_id: &str) -> MarketResult<Notification> {
        let seq: u64 = notification_id
            .parse()
            .map_err(|_| MarketError::not_found("Notification not found"))?;
        let key = keys::notification(&actor.id, seq);
        let mut notification: Notification = self
            .storage
            .get(&key)
            .await?
            .ok_or_else(|| MarketError::not_found("Notification not found"))?;
        if !notification.read {
            notification.read = true;
            self.storage.put(&key, &notification).await?;
        }
        Ok(notification)
    }

    pub async fn mark_all_read(&self, actor: &User) -> MarketResult<MarkAllReadResult> {
        let entries: Vec<(String, Notification)> =
            self.storage.list(&keys::notifications(&actor.id)).await?;
        let mut updated = 0;
        for (key, mut notification) in entries {
            if notification.read {
                continue;
            }
            notification.read = true;
            self.storage.put(&key, &notification).await?;
            updated += 1;
        }
        Ok(MarkAllReadResult { updated })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use tripfin_shared::protocol::ListNotificationsRequest;
    use tripfin_shared::{NotificationPriority, NotificationType, Role};

    #[tokio::test]
    async fn unread_filter_and_mark_read() {
        let (market, _clock) = market();
        let admin = admin(&market).await;
        let lender = registered(&market, Role::Lender, "Lena").await;
        market.approve_user(&admin, &lender.id).await.unwrap();

        let all = market.notifications(&lender, &all_notes()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].read);

        let marked = market.mark_read(&lender, &all[0].id).await.unwrap();
        assert!(marked.read);
        assert!(market.notifications(&lender, &unread_notes()).await.unwrap().is_empty());
        assert_eq!(market.notifications(&lender, &all_notes()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notifications_are_private() {
        let (market, _clock) = market();
        let admin = admin(&market).await;
        let lender = registered(&market, Role::Lender, "Lena").await;
        market.approve_user(&admin, &lender.id).await.unwrap();
        let id = market.notifications(&lender, &all_notes()).await.unwrap()[0].id.clone();

        let err = market.mark_read(&admin, &id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(market.mark_all_read(&admin).await.unwrap().updated, 0);
        assert_eq!(market.mark_all_read(&lender).await.unwrap().updated, 1);
        assert_eq!(market.mark_all_read(&lender).await.unwrap().updated, 0);
    }

    async fn notify_n(market: &TestMarket, user_id: &str, n: usize) {
        for i in 0..n {
            market
                .notify(
                    user_id,
                    NotificationType::InvestmentOpportunity,
                    "New trip",
                    format!("trip #{}", i),
                    NotificationPriority::Medium,
                    None,
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn listing_is_limited_to_the_newest() {
        let (market, _clock) = market();
        let lender = approved(&market, Role::Lender, "Lena").await;
        notify_n(&market, &lender.id, 120).await;

        let default = market.notifications(&lender, &all_notes()).await.unwrap();
        assert_eq!(default.len(), 50);
        assert_eq!(default[0].message, "trip #119");
        assert_eq!(default[49].message, "trip #70");

        let capped = ListNotificationsRequest {
            unread_only: true,
            limit: Some(1_000),
        };
        assert_eq!(market.notifications(&lender, &capped).await.unwrap().len(), 100);

        let three = ListNotificationsRequest {
            unread_only: false,
            limit: Some(3),
        };
        let newest = market.notifications(&lender, &three).await.unwrap();
        let messages: Vec<&str> = newest.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["trip #119", "trip #118", "trip #117"]);
    }

    #[tokio::test]
    async fn prune_drops_old_read_then_old_unread() {
        let (market, clock) = market();
        let lender = approved(&market, Role::Lender, "Lena").await;
        notify_n(&market, &lender.id, 2).await;
        let first = market.notifications(&lender, &all_notes()).await.unwrap()[1].clone();
        market.mark_read(&lender, &first.id).await.unwrap();

        clock.advance_days(30);
        assert_eq!(market.prune_notifications().await.unwrap(), 0);
        clock.advance_days(1);
        assert_eq!(market.prune_notifications().await.unwrap(), 1);
        assert_eq!(market.notifications(&lender, &all_notes()).await.unwrap().len(), 1);

        clock.advance_days(60);
        assert_eq!(market.prune_notifications().await.unwrap(), 1);
        assert!(market.notifications(&lender, &all_notes()).await.unwrap().is_empty());
    }
}
