//! # Dispatch Service
//!
//! 告知メール配信エンジン。ドラフト済みの告知をチームメンバー全員に
//! ちょうど 1 回ずつメール送信し、プロバイダから非同期に届く配信結果を
//! 告知レコードに反映する。
//!
//! ## コンポーネント構成
//!
//! ```text
//! dispatch ハンドラ ──> DispatchUseCaseImpl
//!                        ├─ SendRateLimiter（ウィンドウ集計）
//!                        ├─ TeamRepository（認可・受信者解決）
//!                        ├─ BatchEmailSender（チャンク分割・プロバイダ呼び出し）
//!                        └─ AnnouncementRepository（条件付きステータス遷移）
//!
//! webhook ハンドラ ──> WebhookReconcilerImpl
//!                        ├─ WebhookSignatureVerifier（署名検証）
//!                        └─ AnnouncementRepository（カウンタ・失敗リスト反映）
//! ```
//!
//! dispatch はユーザー操作ごとに 1 回呼ばれる。webhook は独立して
//! 後から届き、dispatch が作った同じ告知レコードを変更する。

pub mod config;
pub mod error;
pub mod handler;
pub mod usecase;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use handler::{
    DispatchState,
    WebhookState,
    create_announcement,
    delete_announcement,
    dispatch_announcement,
    get_announcement_status,
    health_check,
    list_announcements,
    receive_email_webhook,
};

/// アプリケーションルーターを構築する
///
/// テストからもモック注入済みの状態で呼び出せるよう、
/// `main` から分離している。
pub fn app_router(dispatch_state: Arc<DispatchState>, webhook_state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // 告知 API
        .route("/internal/announcements", post(create_announcement))
        .route(
            "/internal/teams/{team_id}/announcements",
            get(list_announcements),
        )
        .route(
            "/internal/announcements/{id}/dispatch",
            post(dispatch_announcement),
        )
        .route(
            "/internal/announcements/{id}/status",
            get(get_announcement_status),
        )
        .route(
            "/internal/announcements/{id}",
            axum::routing::delete(delete_announcement),
        )
        .with_state(dispatch_state)
        // 配信イベント webhook
        .route("/webhooks/email", post(receive_email_webhook))
        .with_state(webhook_state)
}
