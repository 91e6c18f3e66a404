//! # Webhook リコンサイラ
//!
//! メール配信プロバイダから非同期に届く配信イベントを検証し、
//! 該当する告知のカウンタとステータスに反映する。
//!
//! ## 失敗セマンティクス
//!
//! - 署名検証まで（シークレット未設定・署名不一致）はハードフェイル
//!   （HTTP 401/500）
//! - 検証通過後は常にソフト成功（HTTP 200）。プロバイダにリトライさせると
//!   到達数が二重計上されるため、告知ごとの内部エラーはログに記録して
//!   握りつぶす
//! - バッチ ID が未知（告知が削除済み等）のイベントも正常応答する

use std::sync::Arc;

use serde::Deserialize;
use teamboard_domain::{
    announcement::{AnnouncementId, BatchId, EmailStatus},
    clock::Clock,
    delivery::DeliveryEvent,
};
use teamboard_infra::{
    repository::AnnouncementRepository,
    webhook_signature::{WebhookError, WebhookSignatureVerifier},
};
use teamboard_shared::{event_log::event, log_business_event};

use crate::error::DispatchError;

/// プロバイダが付与する署名ヘッダ 3 点
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    /// メッセージ ID
    pub message_id: String,
    /// Unix 秒のタイムスタンプ
    pub timestamp:  String,
    /// `v1,<base64>` エントリの空白区切りリスト
    pub signature:  String,
}

/// webhook ペイロード `{type, data}`
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data:       WebhookEventData,
}

/// イベントデータ部
///
/// プロバイダのイベント種別によってフィールド構成が変わるため、
/// 本エンジンが使うものだけを取り出す。
#[derive(Debug, Default, Deserialize)]
struct WebhookEventData {
    batch_id: Option<String>,
    id:       Option<String>,
    email:    Option<String>,
}

/// Webhook リコンサイラ実装
pub struct WebhookReconcilerImpl {
    announcement_repo: Arc<dyn AnnouncementRepository>,
    verifier:          Option<WebhookSignatureVerifier>,
    clock:             Arc<dyn Clock>,
}

impl WebhookReconcilerImpl {
    pub fn new(
        announcement_repo: Arc<dyn AnnouncementRepository>,
        verifier: Option<WebhookSignatureVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            announcement_repo,
            verifier,
            clock,
        }
    }

    /// webhook を検証し、配信イベントを告知に反映する
    ///
    /// ## 処理フロー
    ///
    /// 1. 署名検証（fail closed。失敗時は本文を一切処理しない）
    /// 2. `{type, data}` をパースし、`data.batch_id` または `data.id` を取り出す
    ///    （どちらもなければ no-op として正常応答）
    /// 3. バッチ ID から告知を完全一致で逆引き（0 件でも正常応答）
    /// 4. 該当する各告知にイベントを適用。告知単位の内部エラーは
    ///    ログに記録して握りつぶす
    ///
    /// # Errors
    ///
    /// - `WebhookError::NotConfigured`: シークレット未設定（500 相当）
    /// - `WebhookError::InvalidSignature` / `StaleTimestamp`: 検証失敗（401 相当）
    pub async fn handle(
        &self,
        headers: &WebhookHeaders,
        payload: &[u8],
    ) -> Result<(), WebhookError> {
        // 1. 署名検証
        let verifier = self.verifier.as_ref().ok_or(WebhookError::NotConfigured)?;
        verifier.verify(
            &headers.message_id,
            &headers.timestamp,
            &headers.signature,
            payload,
            self.clock.now(),
        )?;

        // 2. ペイロードのパース。検証通過後の不備はすべてソフト成功
        let parsed: WebhookPayload = match serde_json::from_slice(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "webhook ペイロードをパースできません");
                return Ok(());
            }
        };

        let Some(batch_id) = parsed.data.batch_id.clone().or_else(|| parsed.data.id.clone())
        else {
            tracing::debug!(
                event_type = %parsed.event_type,
                "バッチ ID のない webhook イベントを無視します"
            );
            return Ok(());
        };
        let batch_id = BatchId::new(batch_id);

        // 3. バッチ ID から告知を逆引き
        let announcement_ids = match self
            .announcement_repo
            .find_ids_by_batch_id(&batch_id)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    error.category = "infrastructure",
                    error.kind = "database",
                    batch_id = %batch_id,
                    "バッチ ID の逆引きに失敗しました"
                );
                return Ok(());
            }
        };

        if announcement_ids.is_empty() {
            // 削除済み告知への遅延イベントなど。プロバイダにはリトライさせない
            tracing::debug!(batch_id = %batch_id, "該当する告知がありません");
            return Ok(());
        }

        // 4. 各告知にイベントを適用
        let delivery_event = DeliveryEvent::parse(&parsed.event_type);
        for id in announcement_ids {
            if let Err(e) = self.apply_event(id, &delivery_event, &parsed.data).await {
                tracing::error!(
                    error = %e,
                    error.category = "infrastructure",
                    error.kind = "webhook_event",
                    announcement_id = %id,
                    event_type = %parsed.event_type,
                    "webhook イベントの適用に失敗しました"
                );
            }
        }

        Ok(())
    }

    /// 1 件の告知に配信イベントを適用する
    async fn apply_event(
        &self,
        id: AnnouncementId,
        delivery_event: &DeliveryEvent,
        data: &WebhookEventData,
    ) -> Result<(), DispatchError> {
        match delivery_event {
            // プロバイダ受理の通知。状態変更なし
            DeliveryEvent::Sent => Ok(()),

            DeliveryEvent::Delivered => {
                let Some(progress) = self.announcement_repo.increment_delivered(id).await? else {
                    return Ok(());
                };

                log_business_event!(
                    event.category = event::category::WEBHOOK,
                    event.action = event::action::WEBHOOK_DELIVERED,
                    event.entity_type = event::entity_type::ANNOUNCEMENT,
                    event.entity_id = %id,
                    event.result = event::result::SUCCESS,
                    delivered_count = progress.delivered_count,
                    recipient_count = progress.recipient_count,
                    "到達イベントを記録しました"
                );

                // sending のまま全件到達した場合の安全網。
                // 通常はディスパッチャが同期的に sent を記録しているため発火しない
                if progress.email_status == EmailStatus::Sending
                    && progress.delivered_count >= progress.recipient_count
                {
                    let promoted = self
                        .announcement_repo
                        .promote_to_sent(id, self.clock.now())
                        .await?;
                    if promoted {
                        log_business_event!(
                            event.category = event::category::WEBHOOK,
                            event.action = event::action::WEBHOOK_PROMOTED_TO_SENT,
                            event.entity_type = event::entity_type::ANNOUNCEMENT,
                            event.entity_id = %id,
                            event.result = event::result::SUCCESS,
                            "全件到達により sent に昇格しました"
                        );
                    }
                }

                Ok(())
            }

            DeliveryEvent::Bounced | DeliveryEvent::Complained => {
                let email = data.email.as_deref().unwrap_or("unknown");
                let applied = self
                    .announcement_repo
                    .append_failed_recipient(id, email)
                    .await?;

                if applied {
                    log_business_event!(
                        event.category = event::category::WEBHOOK,
                        event.action = event::action::WEBHOOK_RECIPIENT_FAILED,
                        event.entity_type = event::entity_type::ANNOUNCEMENT,
                        event.entity_id = %id,
                        event.result = event::result::FAILURE,
                        recipient = %email,
                        "失敗アドレスを記録しました"
                    );
                }

                Ok(())
            }

            DeliveryEvent::Unknown(event_type) => {
                tracing::debug!(
                    event_type = %event_type,
                    announcement_id = %id,
                    "未対応の webhook イベント種別を無視します"
                );
                Ok(())
            }
        }
    }
}
