//! # テスト用モック実装
//!
//! ユースケーステストで使用するインメモリのリポジトリ・メーラー。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! teamboard-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! 条件付き更新（`begin_sending` / `promote_to_sent` /
//! `append_failed_recipient`）は PostgreSQL 実装と同じ
//! 「対象ステータスの行だけ更新し、更新有無を bool で返す」
//! 挙動を再現する。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teamboard_domain::{
    announcement::{
        Announcement,
        AnnouncementContent,
        AnnouncementId,
        AnnouncementTitle,
        BatchId,
        EmailStatus,
        NewAnnouncement,
    },
    mail::{MailerError, OutboundEmail},
    member::Recipient,
    team::{Team, TeamId},
};

use crate::{
    error::InfraError,
    mailer::BatchMailer,
    repository::{AnnouncementRepository, DeliveryProgress, TeamRepository},
};

// ===== MockAnnouncementRepository =====

#[derive(Clone, Default)]
pub struct MockAnnouncementRepository {
    announcements: Arc<Mutex<Vec<Announcement>>>,
    batch_index:   Arc<Mutex<Vec<(BatchId, AnnouncementId)>>>,
    next_id:       Arc<Mutex<i64>>,
}

impl MockAnnouncementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// テストの事前条件として告知を直接投入する
    pub fn add_announcement(&self, announcement: Announcement) {
        self.announcements.lock().unwrap().push(announcement);
    }

    /// テストの事前条件としてバッチ ID 対応を直接投入する
    pub fn add_batch_id(&self, batch_id: BatchId, announcement_id: AnnouncementId) {
        self.batch_index
            .lock()
            .unwrap()
            .push((batch_id, announcement_id));
    }

    fn batch_ids_of(&self, id: AnnouncementId) -> Vec<BatchId> {
        self.batch_index
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, a)| *a == id)
            .map(|(b, _)| b.clone())
            .collect()
    }

    fn update<F>(&self, id: AnnouncementId, f: F) -> Option<Announcement>
    where
        F: FnOnce(Announcement) -> Option<Announcement>,
    {
        let mut announcements = self.announcements.lock().unwrap();
        let pos = announcements.iter().position(|a| a.id() == id)?;
        let updated = f(announcements[pos].clone())?;
        announcements[pos] = updated.clone();
        Some(updated)
    }
}

#[async_trait]
impl AnnouncementRepository for MockAnnouncementRepository {
    async fn create(
        &self,
        team_id: &TeamId,
        title: &AnnouncementTitle,
        content: &AnnouncementContent,
    ) -> Result<Announcement, InfraError> {
        let id = {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            AnnouncementId::new(*next_id)
        };
        let announcement = Announcement::new(NewAnnouncement {
            id,
            team_id: team_id.clone(),
            title: title.clone(),
            content: content.clone(),
            now: Utc::now(),
        });
        self.announcements
            .lock()
            .unwrap()
            .push(announcement.clone());
        Ok(announcement)
    }

    async fn find_by_id(&self, id: AnnouncementId) -> Result<Option<Announcement>, InfraError> {
        Ok(self
            .announcements
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id() == id)
            .cloned())
    }

    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<Announcement>, InfraError> {
        let mut found: Vec<Announcement> = self
            .announcements
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.team_id() == team_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| std::cmp::Reverse(a.created_at()));
        Ok(found)
    }

    async fn delete(&self, id: AnnouncementId) -> Result<bool, InfraError> {
        let mut announcements = self.announcements.lock().unwrap();
        let before = announcements.len();
        announcements.retain(|a| !(a.id() == id && a.can_delete()));
        Ok(announcements.len() < before)
    }

    async fn begin_sending(
        &self,
        id: AnnouncementId,
        recipient_count: u32,
    ) -> Result<bool, InfraError> {
        Ok(self
            .update(id, |a| a.sending_started(recipient_count).ok())
            .is_some())
    }

    async fn mark_sent(
        &self,
        id: AnnouncementId,
        batch_ids: &[BatchId],
        sent_at: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        let updated = self.update(id, |a| a.sent(batch_ids.to_vec(), sent_at).ok());
        if updated.is_none() {
            return Err(InfraError::conflict("Announcement", id.to_string()));
        }
        let mut index = self.batch_index.lock().unwrap();
        for batch_id in batch_ids {
            index.push((batch_id.clone(), id));
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: AnnouncementId,
        error_message: &str,
        batch_ids: &[BatchId],
    ) -> Result<(), InfraError> {
        let updated = self.update(id, |a| {
            a.send_failed(error_message.to_string(), batch_ids.to_vec()).ok()
        });
        if updated.is_none() {
            return Err(InfraError::conflict("Announcement", id.to_string()));
        }
        let mut index = self.batch_index.lock().unwrap();
        for batch_id in batch_ids {
            index.push((batch_id.clone(), id));
        }
        Ok(())
    }

    async fn increment_delivered(
        &self,
        id: AnnouncementId,
    ) -> Result<Option<DeliveryProgress>, InfraError> {
        let updated = self.update(id, |a| a.delivery_recorded().ok());
        Ok(updated.map(|a| DeliveryProgress {
            delivered_count: a.delivered_count(),
            recipient_count: a.recipient_count(),
            email_status:    a.status(),
        }))
    }

    async fn promote_to_sent(
        &self,
        id: AnnouncementId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError> {
        let batch_ids = self.batch_ids_of(id);
        Ok(self
            .update(id, |a| a.promoted_to_sent(batch_ids, now).ok())
            .is_some())
    }

    async fn append_failed_recipient(
        &self,
        id: AnnouncementId,
        email: &str,
    ) -> Result<bool, InfraError> {
        Ok(self.update(id, |a| a.recipient_failed(email).ok()).is_some())
    }

    async fn count_recent_successful(
        &self,
        team_id: &TeamId,
        since: DateTime<Utc>,
    ) -> Result<i64, InfraError> {
        Ok(self
            .announcements
            .lock()
            .unwrap()
            .iter()
            .filter(|a| {
                a.team_id() == team_id
                    && matches!(
                        a.status(),
                        EmailStatus::Sent | EmailStatus::PartiallyFailed
                    )
                    && a.sent_at().is_some_and(|sent_at| sent_at >= since)
            })
            .count() as i64)
    }

    async fn find_ids_by_batch_id(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<AnnouncementId>, InfraError> {
        Ok(self
            .batch_index
            .lock()
            .unwrap()
            .iter()
            .filter(|(b, _)| b == batch_id)
            .map(|(_, id)| *id)
            .collect())
    }
}

// ===== MockTeamRepository =====

#[derive(Clone, Default)]
pub struct MockTeamRepository {
    teams:      Arc<Mutex<Vec<Team>>>,
    recipients: Arc<Mutex<HashMap<TeamId, Vec<Recipient>>>>,
}

impl MockTeamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_team(&self, team: Team) {
        self.teams.lock().unwrap().push(team);
    }

    pub fn set_recipients(&self, team_id: TeamId, recipients: Vec<Recipient>) {
        self.recipients.lock().unwrap().insert(team_id, recipients);
    }
}

#[async_trait]
impl TeamRepository for MockTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, InfraError> {
        Ok(self
            .teams
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id() == id)
            .cloned())
    }

    async fn find_recipients(&self, id: &TeamId) -> Result<Vec<Recipient>, InfraError> {
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}

// ===== MockBatchMailer =====

/// テスト用バッチメーラー
///
/// 送信されたチャンクを記録し、`fail_on_nth_call` で
/// 指定回目の呼び出しを失敗させられる（チャンク途中失敗の再現用）。
#[derive(Clone, Default)]
pub struct MockBatchMailer {
    sent_chunks:  Arc<Mutex<Vec<Vec<OutboundEmail>>>>,
    call_count:   Arc<Mutex<usize>>,
    fail_on_call: Arc<Mutex<Option<usize>>>,
}

impl MockBatchMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// n 回目（1 始まり）の `send_batch` 呼び出しを失敗させる
    pub fn fail_on_nth_call(&self, n: usize) {
        *self.fail_on_call.lock().unwrap() = Some(n);
    }

    /// これまでに送信されたチャンク（呼び出し順）
    pub fn sent_chunks(&self) -> Vec<Vec<OutboundEmail>> {
        self.sent_chunks.lock().unwrap().clone()
    }

    /// `send_batch` の呼び出し回数
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl BatchMailer for MockBatchMailer {
    async fn send_batch(&self, emails: &[OutboundEmail]) -> Result<BatchId, MailerError> {
        let call = {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if *self.fail_on_call.lock().unwrap() == Some(call) {
            return Err(MailerError::SendFailed(
                "モックに設定されたチャンク失敗".to_string(),
            ));
        }

        self.sent_chunks.lock().unwrap().push(emails.to_vec());
        Ok(BatchId::new(format!("batch-{call}")))
    }
}
