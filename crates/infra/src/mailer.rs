//! # バッチメール送信
//!
//! メール配信プロバイダのバッチ送信 API を抽象化するインフラモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `BatchMailer` trait でチャンク単位の送信を抽象化
//! - **2 つの実装**: HTTP（本番・プロバイダ API）、Noop（開発・テスト用）
//! - **環境変数切替**: `MAILER_BACKEND` でランタイム選択
//! - **1 チャンク = 1 バッチ ID**: プロバイダはチャンク送信 1 回ごとに
//!   バッチ ID を 1 つ払い出し、後続の webhook イベントで同じ ID を返す

mod http;
mod noop;

use async_trait::async_trait;
pub use http::HttpBatchMailer;
pub use noop::NoopBatchMailer;
use teamboard_domain::{
    announcement::BatchId,
    mail::{MailerError, OutboundEmail},
};

/// バッチメール送信トレイト
///
/// 配信エンジンの外部境界。1 回の呼び出しが
/// プロバイダへの 1 バッチ送信（最大 100 通）に対応する。
#[async_trait]
pub trait BatchMailer: Send + Sync {
    /// 1 チャンク分のメールを送信し、プロバイダのバッチ ID を返す
    async fn send_batch(&self, emails: &[OutboundEmail]) -> Result<BatchId, MailerError>;
}
