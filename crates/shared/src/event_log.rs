//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! 運用調査時に `jq` で効率的に絞り込めるよう、ログフィールドの命名規約と
//! ヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"`
//! マーカーが自動付与され、
//! `jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: エンティティ種別（[`event::entity_type`] の定数を使用）
/// - `event.entity_id`: エンティティ ID
/// - `event.actor_id`: 操作者 ID
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const ANNOUNCEMENT: &str = "announcement";
        pub const WEBHOOK: &str = "webhook";
    }

    /// イベントアクション
    pub mod action {
        // 告知
        pub const ANNOUNCEMENT_CREATED: &str = "announcement.created";
        pub const ANNOUNCEMENT_DELETED: &str = "announcement.deleted";
        pub const ANNOUNCEMENT_DISPATCHED: &str = "announcement.dispatched";
        pub const ANNOUNCEMENT_DISPATCH_FAILED: &str = "announcement.dispatch_failed";

        // webhook
        pub const WEBHOOK_DELIVERED: &str = "webhook.delivered";
        pub const WEBHOOK_PROMOTED_TO_SENT: &str = "webhook.promoted_to_sent";
        pub const WEBHOOK_RECIPIENT_FAILED: &str = "webhook.recipient_failed";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const ANNOUNCEMENT: &str = "announcement";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（メール配信プロバイダ）
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const PROVIDER: &str = "provider";
        pub const WEBHOOK_EVENT: &str = "webhook_event";
        pub const INTERNAL: &str = "internal";
    }
}
