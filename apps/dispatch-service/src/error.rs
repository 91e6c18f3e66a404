//! # Dispatch Service エラー定義
//!
//! dispatch 操作のエラー分類と、HTTP レスポンスへの変換を定義する。
//!
//! ## 伝播ポリシー
//!
//! 認可・冪等性・レート制限・バリデーションの失敗は一切の書き込みなしで
//! 呼び出し元に返る。プロバイダ失敗は告知を terminal な failed にしたうえで
//! 返る（自動リトライはしない。バッチ API への再送は二重送信のリスクがある）。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use teamboard_domain::announcement::{BatchId, EmailStatus};
use thiserror::Error;

/// エラーレスポンス（RFC 7807 Problem Details）
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title:      String,
    pub status:     u16,
    pub detail:     String,
}

/// Dispatch Service で発生するエラー
#[derive(Debug, Error)]
pub enum DispatchError {
    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 権限不足（操作者がチームリーダーでない）
    #[error("権限がありません: {0}")]
    Forbidden(String),

    /// 冪等性による拒否
    ///
    /// pending 以外の告知への dispatch。現在のステータスを保持し、
    /// プロバイダ呼び出しは一切発生していないことを保証する。
    #[error("告知は既に処理されています（現在のステータス: {0}）")]
    AlreadyProcessed(EmailStatus),

    /// レート制限超過
    #[error("レート制限を超えました（{window_secs} 秒間に最大 {limit} 件）")]
    RateLimited {
        /// ウィンドウ内の最大送信数
        limit:       u32,
        /// ウィンドウ幅（秒）
        window_secs: u64,
    },

    /// 送信先のチームメンバーがいない
    #[error("送信先のチームメンバーがいません")]
    NoRecipients,

    /// メールアドレスのバリデーション失敗
    ///
    /// 1 件でも不正なアドレスがあれば部分送信せずに全体を失敗させる。
    #[error("不正なメールアドレスが含まれています: {}", invalid.join(", "))]
    ValidationFailed {
        /// 不正と判定されたアドレスのリスト
        invalid: Vec<String>,
    },

    /// プロバイダのバッチ送信失敗
    ///
    /// 失敗したチャンクより前に受理されたチャンクはプロバイダ側で
    /// キューイング済みのため取り消せない。受理済みバッチ ID を保持する。
    #[error("メール送信に失敗しました: {message}")]
    Provider {
        /// プロバイダの失敗理由
        message:             String,
        /// 失敗前に受理されたチャンクのバッチ ID
        committed_batch_ids: Vec<BatchId>,
    },

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(#[from] teamboard_infra::InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, error_type, title, detail) = match &self {
            DispatchError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "https://teamboard.example.com/errors/not-found",
                "Not Found",
                msg.clone(),
            ),
            DispatchError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "https://teamboard.example.com/errors/bad-request",
                "Bad Request",
                msg.clone(),
            ),
            DispatchError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "https://teamboard.example.com/errors/forbidden",
                "Forbidden",
                msg.clone(),
            ),
            DispatchError::AlreadyProcessed(_) => (
                StatusCode::CONFLICT,
                "https://teamboard.example.com/errors/already-processed",
                "Already Processed",
                self.to_string(),
            ),
            DispatchError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "https://teamboard.example.com/errors/rate-limited",
                "Rate Limited",
                self.to_string(),
            ),
            DispatchError::NoRecipients => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "https://teamboard.example.com/errors/no-recipients",
                "No Recipients",
                self.to_string(),
            ),
            DispatchError::ValidationFailed { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "https://teamboard.example.com/errors/validation-failed",
                "Validation Failed",
                self.to_string(),
            ),
            DispatchError::Provider { message, .. } => {
                tracing::error!(
                    error.category = "external_service",
                    error.kind = "provider",
                    "プロバイダ送信エラー: {}",
                    message
                );
                (
                    StatusCode::BAD_GATEWAY,
                    "https://teamboard.example.com/errors/provider-error",
                    "Provider Error",
                    message.clone(),
                )
            }
            DispatchError::Database(e) => {
                tracing::error!(
                    error.category = "infrastructure",
                    error.kind = "database",
                    "データベースエラー: {}",
                    e
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "https://teamboard.example.com/errors/internal-error",
                    "Internal Server Error",
                    "内部エラーが発生しました".to_string(),
                )
            }
            DispatchError::Internal(msg) => {
                tracing::error!(
                    error.category = "infrastructure",
                    error.kind = "internal",
                    "内部エラー: {}",
                    msg
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "https://teamboard.example.com/errors/internal-error",
                    "Internal Server Error",
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error_type: error_type.to_string(),
                title: title.to_string(),
                status: status.as_u16(),
                detail,
            }),
        )
            .into_response()
    }
}
