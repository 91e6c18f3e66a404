//! # HTTP ハンドラ
//!
//! axum ハンドラとリクエスト/レスポンス DTO を定義する。

pub mod announcement;
pub mod health;
pub mod webhook;

pub use announcement::{
    AnnouncementDto,
    CreateAnnouncementRequest,
    DispatchRequest,
    DispatchState,
    create_announcement,
    delete_announcement,
    dispatch_announcement,
    get_announcement_status,
    list_announcements,
};
pub use health::health_check;
pub use webhook::{WebhookState, receive_email_webhook};
