//! # バッチメール送信
//!
//! 受信者リストをプロバイダのバッチ上限でチャンクに分割し、
//! 受信者ごとにレンダリングしたメールをチャンク単位で送信する。
//!
//! ## 部分失敗の扱い
//!
//! チャンク送信が失敗した時点で残りのチャンクを中断し、失敗前に
//! 受理されたチャンクのバッチ ID を添えてエラーを返す。受理済みチャンクは
//! プロバイダ側で既にキューイングされているため取り消せない。
//! 呼び出し側は「一部チャンク送信後の失敗」を failed として扱いつつ、
//! 受理済みバッチ ID を運用調査用に永続化する。

use std::sync::Arc;

use teamboard_domain::{
    announcement::BatchId,
    member::{EmailAddress, Recipient},
};
use teamboard_infra::mailer::BatchMailer;

use super::template_renderer::AnnouncementTemplateRenderer;

/// プロバイダの 1 バッチあたりの最大通数
pub const BATCH_LIMIT: usize = 100;

/// バッチ送信の成功結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSendOutcome {
    /// 受理されたチャンクのバッチ ID（チャンク順）
    pub batch_ids:        Vec<BatchId>,
    /// 送信を試行した受信者の総数
    pub total_recipients: usize,
}

/// バッチ送信の失敗
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSendError {
    /// メールアドレスの構文検証に失敗（1 通も送信していない）
    Validation {
        /// 不正と判定されたアドレスのリスト
        invalid: Vec<String>,
    },
    /// プロバイダ呼び出しに失敗（受理済みチャンクは取り消せない）
    Provider {
        /// 失敗理由
        message:             String,
        /// 失敗前に受理されたチャンクのバッチ ID
        committed_batch_ids: Vec<BatchId>,
    },
}

/// バッチメール送信サービス
///
/// 純粋な外部呼び出しラッパーであり、呼び出し側の状態は一切変更しない。
pub struct BatchEmailSender {
    mailer:   Arc<dyn BatchMailer>,
    renderer: AnnouncementTemplateRenderer,
}

impl BatchEmailSender {
    pub fn new(mailer: Arc<dyn BatchMailer>, renderer: AnnouncementTemplateRenderer) -> Self {
        Self { mailer, renderer }
    }

    /// 告知を全受信者に送信する
    ///
    /// ## 処理フロー
    ///
    /// 1. 全アドレスを構文検証（1 件でも不正なら送信せず失敗）
    /// 2. 受信者リストを最大 100 通のチャンクに分割（入力順を保持）
    /// 3. チャンクごとに受信者別レンダリング → プロバイダ呼び出し
    /// 4. チャンク失敗時は即座に中断し、受理済みバッチ ID を添えて返す
    pub async fn send(
        &self,
        recipients: &[Recipient],
        title: &str,
        content: &str,
        team_name: &str,
    ) -> Result<BatchSendOutcome, BatchSendError> {
        // 1. 全アドレスを構文検証
        let invalid: Vec<String> = recipients
            .iter()
            .filter(|r| !EmailAddress::is_valid(r.email()))
            .map(|r| r.email().to_string())
            .collect();

        if !invalid.is_empty() {
            return Err(BatchSendError::Validation { invalid });
        }

        // 2〜4. チャンク分割と送信
        let mut batch_ids = Vec::new();

        for chunk in recipients.chunks(BATCH_LIMIT) {
            let mut emails = Vec::with_capacity(chunk.len());
            for recipient in chunk {
                let email = self
                    .renderer
                    .render(recipient, title, content, team_name)
                    .map_err(|e| BatchSendError::Provider {
                        message:             e.to_string(),
                        committed_batch_ids: batch_ids.clone(),
                    })?;
                emails.push(email);
            }

            let batch_id = self.mailer.send_batch(&emails).await.map_err(|e| {
                BatchSendError::Provider {
                    message:             e.to_string(),
                    committed_batch_ids: batch_ids.clone(),
                }
            })?;

            batch_ids.push(batch_id);
        }

        Ok(BatchSendOutcome {
            batch_ids,
            total_recipients: recipients.len(),
        })
    }
}
