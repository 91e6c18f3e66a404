//! # ユースケース層
//!
//! 告知メール配信エンジンのビジネスロジックを実装する。
//!
//! - [`dispatch`] - 告知の作成・一覧・削除・ステータス参照と dispatch
//! - [`webhook`] - プロバイダ配信イベントの検証と反映
//! - [`batch_sender`] - チャンク分割とプロバイダ呼び出し
//! - [`rate_limiter`] - チーム単位のスライディングウィンドウ制限
//! - [`template_renderer`] - 告知メールのレンダリング

pub mod batch_sender;
pub mod dispatch;
pub mod rate_limiter;
pub mod template_renderer;
pub mod webhook;

pub use batch_sender::{BatchEmailSender, BatchSendError, BatchSendOutcome};
pub use dispatch::{
    AnnouncementStatusView,
    CreateAnnouncementInput,
    DispatchOutcome,
    DispatchUseCaseImpl,
};
pub use rate_limiter::SendRateLimiter;
pub use template_renderer::AnnouncementTemplateRenderer;
pub use webhook::{WebhookHeaders, WebhookReconcilerImpl};
