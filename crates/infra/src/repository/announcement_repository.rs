//! # AnnouncementRepository
//!
//! 告知の永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **条件付きステータス遷移**: `pending → sending` は
//!   `WHERE email_status = 'pending'` 付き UPDATE + 更新行数チェックで行い、
//!   並行 dispatch のうち 1 つだけを通す（冪等性のコミットポイント）
//! - **アトミックなカウンタ加算**: `delivered_count` は
//!   `SET delivered_count = delivered_count + 1` で加算し、
//!   読み取り後の上書きは行わない
//! - **重複排除付きの失敗リスト追記**: JSONB の包含演算子で
//!   既出アドレスの二重追記を単一文で防ぐ
//! - **バッチ ID の正規化**: バッチ ID は専用テーブルに 1 行ずつ格納し、
//!   webhook からの逆引きは完全一致インデックスで行う

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use teamboard_domain::{
    announcement::{
        Announcement,
        AnnouncementContent,
        AnnouncementId,
        AnnouncementRecord,
        AnnouncementTitle,
        BatchId,
        EmailStatus,
        NewAnnouncement,
    },
    team::TeamId,
};

use crate::error::InfraError;

/// 到達イベント適用後の進捗スナップショット
///
/// `increment_delivered` が加算と同時に返す。webhook リコンサイラが
/// 全件到達による `sending → sent` 昇格を判断するために使用する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryProgress {
    pub delivered_count: u32,
    pub recipient_count: u32,
    pub email_status:    EmailStatus,
}

/// 告知リポジトリトレイト
///
/// 告知の永続化操作を定義する。書き込みメソッドはすべて
/// アトミックであり、呼び出し側での read-modify-write を前提にしない。
#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    /// 告知を作成する（pending、ID はストアが採番）
    async fn create(
        &self,
        team_id: &TeamId,
        title: &AnnouncementTitle,
        content: &AnnouncementContent,
    ) -> Result<Announcement, InfraError>;

    /// ID で告知を取得する
    async fn find_by_id(&self, id: AnnouncementId) -> Result<Option<Announcement>, InfraError>;

    /// チームの告知一覧を取得する（作成日時の降順）
    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<Announcement>, InfraError>;

    /// 告知を削除する（pending / failed のみ）
    ///
    /// # 戻り値
    ///
    /// - `Ok(true)`: 削除された
    /// - `Ok(false)`: 行が存在しないか、削除不可のステータスだった
    async fn delete(&self, id: AnnouncementId) -> Result<bool, InfraError>;

    /// 送信処理を開始する（pending → sending の条件付き更新）
    ///
    /// `recipient_count` を同一文で確定する。これが dispatch の
    /// コミットポイントであり、並行呼び出しのうち 1 つだけが `true` を得る。
    ///
    /// # 戻り値
    ///
    /// - `Ok(true)`: 遷移した
    /// - `Ok(false)`: 行が pending でなかった（冪等性により拒否）
    async fn begin_sending(
        &self,
        id: AnnouncementId,
        recipient_count: u32,
    ) -> Result<bool, InfraError>;

    /// 送信完了を記録する（sending → sent + バッチ ID の登録）
    async fn mark_sent(
        &self,
        id: AnnouncementId,
        batch_ids: &[BatchId],
        sent_at: DateTime<Utc>,
    ) -> Result<(), InfraError>;

    /// 送信失敗を記録する（sending → failed）
    ///
    /// 失敗前に受理されたチャンクのバッチ ID があれば運用調査用に登録する。
    async fn mark_failed(
        &self,
        id: AnnouncementId,
        error_message: &str,
        batch_ids: &[BatchId],
    ) -> Result<(), InfraError>;

    /// 到達数を 1 加算し、加算後の進捗を返す
    ///
    /// # 戻り値
    ///
    /// - `Ok(Some(progress))`: 加算後のスナップショット
    /// - `Ok(None)`: 行が存在しない（削除済み告知への遅延イベント）
    async fn increment_delivered(
        &self,
        id: AnnouncementId,
    ) -> Result<Option<DeliveryProgress>, InfraError>;

    /// 全件到達した sending の告知を sent に昇格する（条件付き更新）
    ///
    /// `sent_at` が未設定の場合のみ `now` で補完する。
    ///
    /// # 戻り値
    ///
    /// - `Ok(true)`: 昇格した
    /// - `Ok(false)`: 条件を満たす行がなかった
    async fn promote_to_sent(
        &self,
        id: AnnouncementId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError>;

    /// 失敗アドレスを重複排除して追記し、partially_failed に遷移する
    ///
    /// sending / sent / partially_failed の行のみ対象（単調遷移）。
    ///
    /// # 戻り値
    ///
    /// - `Ok(true)`: 追記または遷移した
    /// - `Ok(false)`: 対象ステータスの行がなかった
    async fn append_failed_recipient(
        &self,
        id: AnnouncementId,
        email: &str,
    ) -> Result<bool, InfraError>;

    /// 指定時刻以降に送信成功（sent / partially_failed）した告知数を返す
    ///
    /// レート制限のウィンドウ計算に使用する。
    async fn count_recent_successful(
        &self,
        team_id: &TeamId,
        since: DateTime<Utc>,
    ) -> Result<i64, InfraError>;

    /// バッチ ID から告知 ID を逆引きする（完全一致）
    async fn find_ids_by_batch_id(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<AnnouncementId>, InfraError>;
}

/// PostgreSQL 実装の AnnouncementRepository
#[derive(Debug, Clone)]
pub struct PostgresAnnouncementRepository {
    pool: PgPool,
}

impl PostgresAnnouncementRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 告知 1 行 + 集約済みバッチ ID を取得する SELECT 句
const SELECT_ANNOUNCEMENT: &str = r#"
    SELECT
        a.id, a.team_id, a.title, a.content, a.email_status,
        a.recipient_count, a.delivered_count, a.error_message,
        a.failed_recipients, a.sent_at, a.created_at,
        COALESCE(
            (SELECT array_agg(b.batch_id ORDER BY b.created_at, b.batch_id)
             FROM announcement_batch_ids b
             WHERE b.announcement_id = a.id),
            ARRAY[]::text[]
        ) AS batch_ids
    FROM announcements a
"#;

fn row_to_announcement(row: &PgRow) -> Result<Announcement, InfraError> {
    let status_str: String = row.try_get("email_status")?;
    let email_status = status_str
        .parse::<EmailStatus>()
        .map_err(|e| InfraError::unexpected(e.to_string()))?;
    let title = AnnouncementTitle::new(row.try_get::<String, _>("title")?)
        .map_err(|e| InfraError::unexpected(e.to_string()))?;
    let content = AnnouncementContent::new(row.try_get::<String, _>("content")?)
        .map_err(|e| InfraError::unexpected(e.to_string()))?;
    let Json(failed_recipients): Json<Vec<String>> = row.try_get("failed_recipients")?;
    let batch_ids: Vec<String> = row.try_get("batch_ids")?;

    let record = AnnouncementRecord {
        id: AnnouncementId::new(row.try_get("id")?),
        team_id: TeamId::from_uuid(row.try_get("team_id")?),
        title,
        content,
        email_status,
        recipient_count: row.try_get::<i32, _>("recipient_count")? as u32,
        delivered_count: row.try_get::<i32, _>("delivered_count")? as u32,
        error_message: row.try_get("error_message")?,
        failed_recipients,
        batch_ids: batch_ids.into_iter().map(BatchId::new).collect(),
        sent_at: row.try_get("sent_at")?,
        created_at: row.try_get("created_at")?,
    };

    Announcement::from_db(record).map_err(|e| InfraError::unexpected(e.to_string()))
}

async fn insert_batch_ids(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: AnnouncementId,
    batch_ids: &[BatchId],
) -> Result<(), InfraError> {
    for batch_id in batch_ids {
        sqlx::query(
            r#"
            INSERT INTO announcement_batch_ids (batch_id, announcement_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(batch_id.as_str())
        .bind(id.as_i64())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl AnnouncementRepository for PostgresAnnouncementRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn create(
        &self,
        team_id: &TeamId,
        title: &AnnouncementTitle,
        content: &AnnouncementContent,
    ) -> Result<Announcement, InfraError> {
        let row = sqlx::query(
            r#"
            INSERT INTO announcements (team_id, title, content, email_status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING id, created_at
            "#,
        )
        .bind(team_id.as_uuid())
        .bind(title.as_str())
        .bind(content.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Announcement::new(NewAnnouncement {
            id:      AnnouncementId::new(row.try_get("id")?),
            team_id: team_id.clone(),
            title:   title.clone(),
            content: content.clone(),
            now:     row.try_get("created_at")?,
        }))
    }

    async fn find_by_id(&self, id: AnnouncementId) -> Result<Option<Announcement>, InfraError> {
        let query = format!("{SELECT_ANNOUNCEMENT} WHERE a.id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_announcement).transpose()
    }

    async fn find_by_team(&self, team_id: &TeamId) -> Result<Vec<Announcement>, InfraError> {
        let query = format!("{SELECT_ANNOUNCEMENT} WHERE a.team_id = $1 ORDER BY a.created_at DESC");
        let rows = sqlx::query(&query)
            .bind(team_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_announcement).collect()
    }

    async fn delete(&self, id: AnnouncementId) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            DELETE FROM announcements
            WHERE id = $1 AND email_status IN ('pending', 'failed')
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn begin_sending(
        &self,
        id: AnnouncementId,
        recipient_count: u32,
    ) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE announcements
            SET email_status = 'sending', recipient_count = $2
            WHERE id = $1 AND email_status = 'pending'
            "#,
        )
        .bind(id.as_i64())
        .bind(recipient_count as i32)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn mark_sent(
        &self,
        id: AnnouncementId,
        batch_ids: &[BatchId],
        sent_at: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE announcements
            SET email_status = 'sent', sent_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(sent_at)
        .execute(&mut *tx)
        .await?;

        insert_batch_ids(&mut tx, id, batch_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn mark_failed(
        &self,
        id: AnnouncementId,
        error_message: &str,
        batch_ids: &[BatchId],
    ) -> Result<(), InfraError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE announcements
            SET email_status = 'failed', error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(error_message)
        .execute(&mut *tx)
        .await?;

        insert_batch_ids(&mut tx, id, batch_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn increment_delivered(
        &self,
        id: AnnouncementId,
    ) -> Result<Option<DeliveryProgress>, InfraError> {
        let row = sqlx::query(
            r#"
            UPDATE announcements
            SET delivered_count = delivered_count + 1
            WHERE id = $1
            RETURNING delivered_count, recipient_count, email_status
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_str: String = row.try_get("email_status")?;
        Ok(Some(DeliveryProgress {
            delivered_count: row.try_get::<i32, _>("delivered_count")? as u32,
            recipient_count: row.try_get::<i32, _>("recipient_count")? as u32,
            email_status:    status_str
                .parse::<EmailStatus>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
        }))
    }

    async fn promote_to_sent(
        &self,
        id: AnnouncementId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE announcements
            SET email_status = 'sent', sent_at = COALESCE(sent_at, $2)
            WHERE id = $1
              AND email_status = 'sending'
              AND delivered_count >= recipient_count
            "#,
        )
        .bind(id.as_i64())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_failed_recipient(
        &self,
        id: AnnouncementId,
        email: &str,
    ) -> Result<bool, InfraError> {
        // JSONB の `?`（包含）演算子で既出アドレスの二重追記を防ぐ。
        // sending / sent / partially_failed のみ対象（単調遷移）。
        let result = sqlx::query(
            r#"
            UPDATE announcements
            SET failed_recipients = CASE
                    WHEN failed_recipients ? $2::text THEN failed_recipients
                    ELSE failed_recipients || to_jsonb($2::text)
                END,
                email_status = 'partially_failed'
            WHERE id = $1
              AND email_status IN ('sending', 'sent', 'partially_failed')
            "#,
        )
        .bind(id.as_i64())
        .bind(email)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_recent_successful(
        &self,
        team_id: &TeamId,
        since: DateTime<Utc>,
    ) -> Result<i64, InfraError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM announcements
            WHERE team_id = $1
              AND sent_at >= $2
              AND email_status IN ('sent', 'partially_failed')
            "#,
        )
        .bind(team_id.as_uuid())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }

    async fn find_ids_by_batch_id(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<AnnouncementId>, InfraError> {
        let rows = sqlx::query(
            r#"
            SELECT announcement_id
            FROM announcement_batch_ids
            WHERE batch_id = $1
            ORDER BY announcement_id
            "#,
        )
        .bind(batch_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok(AnnouncementId::new(row.try_get("announcement_id")?)))
            .collect()
    }
}
