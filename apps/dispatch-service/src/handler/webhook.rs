//! Webhook ハンドラ
//!
//! メール配信プロバイダからの配信イベントを受け取る。
//! 本システム唯一のデフォルト非認証な受信面であり、署名検証のみを信頼する。
//!
//! ## レスポンスポリシー
//!
//! | ケース | HTTP |
//! |--------|------|
//! | 署名シークレット未設定 | 500 |
//! | 署名検証失敗 | 401 |
//! | それ以外（未知のバッチ ID・内部エラー含む） | 200 |
//!
//! 検証通過後は常に 200 を返す。プロバイダにリトライさせると
//! 到達数が二重計上されるため、内部エラーでも失敗応答しない。

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use teamboard_infra::webhook_signature::WebhookError;

use crate::usecase::{WebhookHeaders, WebhookReconcilerImpl};

/// プロバイダが付与する署名ヘッダ名
const HEADER_MESSAGE_ID: &str = "svix-id";
const HEADER_TIMESTAMP: &str = "svix-timestamp";
const HEADER_SIGNATURE: &str = "svix-signature";

/// webhook ハンドラの状態
pub struct WebhookState {
    pub reconciler: WebhookReconcilerImpl,
}

/// 受信確認レスポンス
#[derive(Debug, Serialize)]
struct WebhookAck {
    received: bool,
}

/// エラーレスポンス（署名検証失敗・設定不備時のみ）
#[derive(Debug, Serialize)]
struct WebhookErrorResponse {
    error: String,
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// 配信イベント webhook を受け取る
///
/// ## エンドポイント
/// POST /webhooks/email
pub async fn receive_email_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let webhook_headers = WebhookHeaders {
        message_id: header_value(&headers, HEADER_MESSAGE_ID),
        timestamp:  header_value(&headers, HEADER_TIMESTAMP),
        signature:  header_value(&headers, HEADER_SIGNATURE),
    };

    match state.reconciler.handle(&webhook_headers, &body).await {
        Ok(()) => (StatusCode::OK, Json(WebhookAck { received: true })).into_response(),
        Err(WebhookError::NotConfigured) => {
            tracing::error!("webhook 署名シークレットが設定されていません");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookErrorResponse {
                    error: "webhook not configured".to_string(),
                }),
            )
                .into_response()
        }
        Err(WebhookError::InvalidSignature | WebhookError::StaleTimestamp) => (
            StatusCode::UNAUTHORIZED,
            Json(WebhookErrorResponse {
                error: "invalid signature".to_string(),
            }),
        )
            .into_response(),
    }
}
