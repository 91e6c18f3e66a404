//! # 送信レート制限
//!
//! チームごとの送信頻度をスライディングウィンドウで制限する。
//!
//! ## 集計ルール
//!
//! `sent_at` が直近ウィンドウ内にあり、かつステータスが
//! sent / partially_failed の告知を数える。failed はプロバイダ失敗で
//! メールが届いていない可能性が高いため数えない。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use teamboard_domain::team::TeamId;
use teamboard_infra::repository::AnnouncementRepository;

use crate::error::DispatchError;

/// 送信レート制限
///
/// dispatch の前段で呼び出し、上限超過時は一切の書き込みなしで拒否する。
pub struct SendRateLimiter {
    announcement_repo: Arc<dyn AnnouncementRepository>,
    limit:             u32,
    window:            Duration,
}

impl SendRateLimiter {
    pub fn new(
        announcement_repo: Arc<dyn AnnouncementRepository>,
        limit: u32,
        window_secs: u64,
    ) -> Self {
        Self {
            announcement_repo,
            limit,
            window: Duration::seconds(window_secs as i64),
        }
    }

    /// ウィンドウ内の送信成功数が上限未満であることを確認する
    ///
    /// # Errors
    ///
    /// - `DispatchError::RateLimited`: 上限に達している場合
    pub async fn check(&self, team_id: &TeamId, now: DateTime<Utc>) -> Result<(), DispatchError> {
        let since = now - self.window;
        let count = self
            .announcement_repo
            .count_recent_successful(team_id, since)
            .await?;

        if count >= i64::from(self.limit) {
            return Err(DispatchError::RateLimited {
                limit:       self.limit,
                window_secs: self.window.num_seconds() as u64,
            });
        }

        Ok(())
    }
}
