//! # 告知
//!
//! チームメンバー全員へのメール一斉配信の単位となる告知エンティティと、
//! その配信ステータスのステートマシンを定義する。
//!
//! ## ステートマシン
//!
//! ```text
//! pending ──> sending ──> sent ──────┐
//!                │                   ├──> partially_failed
//!                ├──────────────────-┘        （バウンス・迷惑メール報告）
//!                └──> failed
//! ```
//!
//! - `pending → sending` はディスパッチャの条件付き更新（コミットポイント）
//! - `sending → sent` はプロバイダ呼び出し成功直後にディスパッチャが行う。
//!   webhook 経由の到達数による昇格は安全網であり、主経路ではない
//! - `sending → failed` はプロバイダ呼び出し失敗時のロールバック
//! - `partially_failed` への遷移は単調で、`sent` に戻ることはない
//! - `pending` と `failed` のみ削除・再送可能
//!
//! 状態遷移は ADT（代数的データ型）で表現し、不正な状態を型レベルで防止する。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, team::TeamId};

/// 告知 ID
///
/// ストアが採番する 64bit 整数。UUID ベースの他エンティティと異なり、
/// `announcements` テーブルの IDENTITY 列をそのまま使用する。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[display("{_0}")]
pub struct AnnouncementId(i64);

impl AnnouncementId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// バッチ ID
///
/// プロバイダがチャンク送信 1 回ごとに払い出す不透明な識別子。
/// webhook イベントと告知を突き合わせるための相関キーになる。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{_0}")]
pub struct BatchId(String);

impl BatchId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

define_validated_string! {
    /// 告知タイトル（200 文字以内）
    pub struct AnnouncementTitle {
        label: "タイトル",
        max_length: 200,
    }
}

define_validated_string! {
    /// 告知本文（2000 文字以内）
    pub struct AnnouncementContent {
        label: "本文",
        max_length: 2000,
    }
}

/// 告知のメール配信ステータス
///
/// `announcements` テーブルの `email_status` カラムに格納される値。
/// snake_case でシリアライズされる。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailStatus {
    /// 未送信（作成直後）
    Pending,
    /// 送信処理中
    Sending,
    /// 送信完了
    Sent,
    /// 一部失敗（バウンス・迷惑メール報告あり）
    PartiallyFailed,
    /// 送信失敗
    Failed,
}

impl EmailStatus {
    /// DB 格納用の snake_case 文字列を返す
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// 再送（dispatch）可能なステータスかどうか
    ///
    /// 冪等性チェックの根拠。`pending` 以外への dispatch は
    /// プロバイダ呼び出しを発生させずに拒否される。
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// 削除可能なステータスかどうか
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

impl std::str::FromStr for EmailStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "partially_failed" => Ok(Self::PartiallyFailed),
            "failed" => Ok(Self::Failed),
            _ => Err(DomainError::Validation(format!(
                "不正なメール配信ステータス: {}",
                s
            ))),
        }
    }
}

/// 告知の状態（ADT ベースステートマシン）
///
/// 各状態で有効なフィールドのみを持たせることで、不正な状態を型レベルで防止する。
/// 例: `sent_at` は `sent` になって初めて必須になり、`pending` では存在しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnouncementState {
    /// 未送信
    Pending,
    /// 送信処理中
    Sending(SendingState),
    /// 送信完了
    Sent(SentState),
    /// 一部失敗
    PartiallyFailed(PartiallyFailedState),
    /// 送信失敗
    Failed(FailedState),
}

/// Sending 状態の固有フィールド
///
/// `recipient_count` は送信開始時に一度だけ確定し、以後再計算されない。
/// バッチ ID はプロバイダ呼び出しが返るまで存在しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendingState {
    pub recipient_count: u32,
    pub delivered_count: u32,
}

/// Sent 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentState {
    pub recipient_count: u32,
    pub delivered_count: u32,
    /// プロバイダが払い出したバッチ ID（チャンクごとに 1 件、常に非空）
    pub batch_ids:       Vec<BatchId>,
    pub sent_at:         DateTime<Utc>,
}

/// PartiallyFailed 状態の固有フィールド
///
/// `sending` から直接遷移した場合（webhook が sent 記録より先に処理された場合）
/// は `sent_at` と `batch_ids` が未確定のことがある。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartiallyFailedState {
    pub recipient_count:   u32,
    pub delivered_count:   u32,
    pub batch_ids:         Vec<BatchId>,
    pub sent_at:           Option<DateTime<Utc>>,
    /// バウンス・迷惑メール報告のあったアドレス（重複排除済み、常に非空）
    pub failed_recipients: Vec<String>,
}

/// Failed 状態の固有フィールド
///
/// チャンク送信の途中で失敗した場合、失敗前に受理されたチャンクの
/// バッチ ID が残る（プロバイダ側で既にキューイング済みのため取り消せない）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedState {
    pub recipient_count: u32,
    pub delivered_count: u32,
    pub batch_ids:       Vec<BatchId>,
    pub error_message:   String,
}

/// 告知エンティティ
///
/// チームメンバー全員に送信されるメール一斉配信の単位。
/// 共通フィールドを外側に、状態固有フィールドを `state` enum に分離する。
///
/// ## 並行性
///
/// `pending → sending` の遷移は永続化層の条件付き更新
/// （`WHERE email_status = 'pending'` + 更新行数チェック）で直列化される。
/// このエンティティの遷移メソッドは遷移ルールの検証と
/// インメモリ表現の更新を担う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    id:         AnnouncementId,
    team_id:    TeamId,
    title:      AnnouncementTitle,
    content:    AnnouncementContent,
    created_at: DateTime<Utc>,
    state:      AnnouncementState,
}

/// 告知の新規作成パラメータ
pub struct NewAnnouncement {
    pub id:      AnnouncementId,
    pub team_id: TeamId,
    pub title:   AnnouncementTitle,
    pub content: AnnouncementContent,
    pub now:     DateTime<Utc>,
}

/// 告知の DB 復元パラメータ
///
/// DB スキーマのフラット構造を表現する。`from_db()` で不変条件を検証して
/// ADT に変換する。
pub struct AnnouncementRecord {
    pub id: AnnouncementId,
    pub team_id: TeamId,
    pub title: AnnouncementTitle,
    pub content: AnnouncementContent,
    pub email_status: EmailStatus,
    pub recipient_count: u32,
    pub delivered_count: u32,
    pub error_message: Option<String>,
    pub failed_recipients: Vec<String>,
    pub batch_ids: Vec<BatchId>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Announcement {
    /// 新しい告知を作成する（pending）
    pub fn new(params: NewAnnouncement) -> Self {
        Self {
            id:         params.id,
            team_id:    params.team_id,
            title:      params.title,
            content:    params.content,
            created_at: params.now,
            state:      AnnouncementState::Pending,
        }
    }

    /// 既存のデータから復元する
    ///
    /// DB のフラット構造から ADT に変換し、状態ごとの不変条件を検証する。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 不変条件違反
    ///   （例: sent なのに sent_at が NULL、partially_failed なのに失敗リストが空）
    pub fn from_db(record: AnnouncementRecord) -> Result<Self, DomainError> {
        let state = match record.email_status {
            EmailStatus::Pending => AnnouncementState::Pending,
            EmailStatus::Sending => {
                if record.recipient_count == 0 {
                    return Err(DomainError::Validation(
                        "sending の告知には 1 件以上の recipient_count が必要です".to_string(),
                    ));
                }
                AnnouncementState::Sending(SendingState {
                    recipient_count: record.recipient_count,
                    delivered_count: record.delivered_count,
                })
            }
            EmailStatus::Sent => {
                let sent_at = record.sent_at.ok_or_else(|| {
                    DomainError::Validation("sent の告知には sent_at が必要です".to_string())
                })?;
                if record.batch_ids.is_empty() {
                    return Err(DomainError::Validation(
                        "sent の告知には 1 件以上のバッチ ID が必要です".to_string(),
                    ));
                }
                AnnouncementState::Sent(SentState {
                    recipient_count: record.recipient_count,
                    delivered_count: record.delivered_count,
                    batch_ids: record.batch_ids,
                    sent_at,
                })
            }
            EmailStatus::PartiallyFailed => {
                if record.failed_recipients.is_empty() {
                    return Err(DomainError::Validation(
                        "partially_failed の告知には 1 件以上の失敗アドレスが必要です".to_string(),
                    ));
                }
                AnnouncementState::PartiallyFailed(PartiallyFailedState {
                    recipient_count:   record.recipient_count,
                    delivered_count:   record.delivered_count,
                    batch_ids:         record.batch_ids,
                    sent_at:           record.sent_at,
                    failed_recipients: record.failed_recipients,
                })
            }
            EmailStatus::Failed => {
                let error_message = record.error_message.ok_or_else(|| {
                    DomainError::Validation(
                        "failed の告知には error_message が必要です".to_string(),
                    )
                })?;
                AnnouncementState::Failed(FailedState {
                    recipient_count: record.recipient_count,
                    delivered_count: record.delivered_count,
                    batch_ids: record.batch_ids,
                    error_message,
                })
            }
        };

        Ok(Self {
            id: record.id,
            team_id: record.team_id,
            title: record.title,
            content: record.content,
            created_at: record.created_at,
            state,
        })
    }

    // Getter メソッド

    pub fn id(&self) -> AnnouncementId {
        self.id
    }

    pub fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    pub fn title(&self) -> &AnnouncementTitle {
        &self.title
    }

    pub fn content(&self) -> &AnnouncementContent {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 状態への直接アクセス（パターンマッチ用）
    pub fn state(&self) -> &AnnouncementState {
        &self.state
    }

    pub fn status(&self) -> EmailStatus {
        match &self.state {
            AnnouncementState::Pending => EmailStatus::Pending,
            AnnouncementState::Sending(_) => EmailStatus::Sending,
            AnnouncementState::Sent(_) => EmailStatus::Sent,
            AnnouncementState::PartiallyFailed(_) => EmailStatus::PartiallyFailed,
            AnnouncementState::Failed(_) => EmailStatus::Failed,
        }
    }

    /// 送信開始時に確定した受信者数（pending では 0）
    pub fn recipient_count(&self) -> u32 {
        match &self.state {
            AnnouncementState::Pending => 0,
            AnnouncementState::Sending(s) => s.recipient_count,
            AnnouncementState::Sent(s) => s.recipient_count,
            AnnouncementState::PartiallyFailed(s) => s.recipient_count,
            AnnouncementState::Failed(s) => s.recipient_count,
        }
    }

    /// webhook で記録された到達数
    ///
    /// プロバイダの重複イベントにより `recipient_count` を超えることがある。
    pub fn delivered_count(&self) -> u32 {
        match &self.state {
            AnnouncementState::Pending => 0,
            AnnouncementState::Sending(s) => s.delivered_count,
            AnnouncementState::Sent(s) => s.delivered_count,
            AnnouncementState::PartiallyFailed(s) => s.delivered_count,
            AnnouncementState::Failed(s) => s.delivered_count,
        }
    }

    pub fn batch_ids(&self) -> &[BatchId] {
        match &self.state {
            AnnouncementState::Pending | AnnouncementState::Sending(_) => &[],
            AnnouncementState::Sent(s) => &s.batch_ids,
            AnnouncementState::PartiallyFailed(s) => &s.batch_ids,
            AnnouncementState::Failed(s) => &s.batch_ids,
        }
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            AnnouncementState::Sent(s) => Some(s.sent_at),
            AnnouncementState::PartiallyFailed(s) => s.sent_at,
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            AnnouncementState::Failed(s) => Some(&s.error_message),
            _ => None,
        }
    }

    /// バウンス・迷惑メール報告のあったアドレス（重複排除済み）
    pub fn failed_recipients(&self) -> &[String] {
        match &self.state {
            AnnouncementState::PartiallyFailed(s) => &s.failed_recipients,
            _ => &[],
        }
    }

    /// 削除可能かどうか（pending / failed のみ）
    pub fn can_delete(&self) -> bool {
        self.status().is_deletable()
    }

    // 状態遷移メソッド

    /// 送信処理を開始した新しい告知を返す（pending → sending）
    ///
    /// `recipient_count` はこの時点で確定し、以後再計算されない。
    /// 永続化層ではこの遷移を条件付き更新で行い、並行 dispatch を排除する。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: pending 以外から呼び出した場合、
    ///   または受信者が 0 件の場合
    pub fn sending_started(self, recipient_count: u32) -> Result<Self, DomainError> {
        if recipient_count == 0 {
            return Err(DomainError::Validation(
                "受信者が 0 件の告知は送信できません".to_string(),
            ));
        }
        match self.state {
            AnnouncementState::Pending => Ok(Self {
                state: AnnouncementState::Sending(SendingState {
                    recipient_count,
                    delivered_count: 0,
                }),
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "送信開始は pending の告知でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 送信完了した新しい告知を返す（sending → sent）
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: sending 以外から呼び出した場合、
    ///   またはバッチ ID が空の場合
    pub fn sent(self, batch_ids: Vec<BatchId>, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if batch_ids.is_empty() {
            return Err(DomainError::Validation(
                "送信完了にはバッチ ID が 1 件以上必要です".to_string(),
            ));
        }
        match self.state {
            AnnouncementState::Sending(sending) => Ok(Self {
                state: AnnouncementState::Sent(SentState {
                    recipient_count: sending.recipient_count,
                    delivered_count: sending.delivered_count,
                    batch_ids,
                    sent_at: now,
                }),
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "送信完了は sending の告知でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 送信失敗した新しい告知を返す（sending → failed）
    ///
    /// チャンク送信の途中で失敗した場合、失敗前に受理されたチャンクの
    /// バッチ ID を運用調査用に保持する（空でもよい）。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: sending 以外から呼び出した場合
    pub fn send_failed(
        self,
        error_message: String,
        batch_ids: Vec<BatchId>,
    ) -> Result<Self, DomainError> {
        match self.state {
            AnnouncementState::Sending(sending) => Ok(Self {
                state: AnnouncementState::Failed(FailedState {
                    recipient_count: sending.recipient_count,
                    delivered_count: sending.delivered_count,
                    batch_ids,
                    error_message,
                }),
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "送信失敗の記録は sending の告知でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 到達イベントを 1 件記録した新しい告知を返す
    ///
    /// プロバイダの重複イベントはそのまま加算される（重複排除しない）ため、
    /// `delivered_count` が `recipient_count` を超えることは許容する。
    /// failed の告知にも加算する（失敗前に受理されたチャンクが到達しうる）。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: pending の告知に対して呼び出した場合
    ///   （バッチ ID が存在しないため本来到達しえない）
    pub fn delivery_recorded(self) -> Result<Self, DomainError> {
        match self.state {
            AnnouncementState::Pending => Err(DomainError::Validation(
                "pending の告知には到達イベントを記録できません".to_string(),
            )),
            AnnouncementState::Sending(s) => Ok(Self {
                state: AnnouncementState::Sending(SendingState {
                    delivered_count: s.delivered_count + 1,
                    ..s
                }),
                ..self
            }),
            AnnouncementState::Sent(s) => Ok(Self {
                state: AnnouncementState::Sent(SentState {
                    delivered_count: s.delivered_count + 1,
                    ..s
                }),
                ..self
            }),
            AnnouncementState::PartiallyFailed(s) => Ok(Self {
                state: AnnouncementState::PartiallyFailed(PartiallyFailedState {
                    delivered_count: s.delivered_count + 1,
                    ..s
                }),
                ..self
            }),
            AnnouncementState::Failed(s) => Ok(Self {
                state: AnnouncementState::Failed(FailedState {
                    delivered_count: s.delivered_count + 1,
                    ..s
                }),
                ..self
            }),
        }
    }

    /// 全件到達による昇格が可能かどうか（sending かつ到達数が受信者数以上）
    pub fn delivery_complete(&self) -> bool {
        match &self.state {
            AnnouncementState::Sending(s) => s.delivered_count >= s.recipient_count,
            _ => false,
        }
    }

    /// 到達数の充足による昇格を行った新しい告知を返す（sending → sent）
    ///
    /// ディスパッチャの sent 記録が何らかの理由で先行しなかった場合の
    /// 安全網。バッチ ID はバッチ ID ストアに記録済みのものを渡す。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 昇格条件を満たしていない場合
    pub fn promoted_to_sent(
        self,
        batch_ids: Vec<BatchId>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !self.delivery_complete() {
            return Err(DomainError::Validation(format!(
                "昇格は sending かつ全件到達の告知でのみ可能です（現在: {}）",
                self.status()
            )));
        }
        self.sent(batch_ids, now)
    }

    /// 失敗アドレスを 1 件記録した新しい告知を返す
    ///
    /// 失敗リストはアドレスで重複排除される（同一バウンスの再通知を二重計上しない）。
    /// 遷移は単調で、一度 partially_failed になった告知が sent に戻ることはない。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: sending / sent / partially_failed
    ///   以外から呼び出した場合
    pub fn recipient_failed(self, email: &str) -> Result<Self, DomainError> {
        match self.state {
            AnnouncementState::Sending(s) => Ok(Self {
                state: AnnouncementState::PartiallyFailed(PartiallyFailedState {
                    recipient_count:   s.recipient_count,
                    delivered_count:   s.delivered_count,
                    batch_ids:         Vec::new(),
                    sent_at:           None,
                    failed_recipients: vec![email.to_string()],
                }),
                ..self
            }),
            AnnouncementState::Sent(s) => Ok(Self {
                state: AnnouncementState::PartiallyFailed(PartiallyFailedState {
                    recipient_count:   s.recipient_count,
                    delivered_count:   s.delivered_count,
                    batch_ids:         s.batch_ids,
                    sent_at:           Some(s.sent_at),
                    failed_recipients: vec![email.to_string()],
                }),
                ..self
            }),
            AnnouncementState::PartiallyFailed(mut s) => {
                if !s.failed_recipients.iter().any(|e| e == email) {
                    s.failed_recipients.push(email.to_string());
                }
                Ok(Self {
                    state: AnnouncementState::PartiallyFailed(s),
                    ..self
                })
            }
            _ => Err(DomainError::Validation(format!(
                "失敗アドレスの記録は送信済みの告知でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }
}
