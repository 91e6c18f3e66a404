//! # 送信メール
//!
//! バッチ送信プロバイダに渡すメールメッセージと、送信エラーを定義する。

use thiserror::Error;

/// メール送信エラー
#[derive(Debug, Error)]
pub enum MailerError {
    /// プロバイダ API 呼び出しに失敗
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),

    /// プロバイダ API 呼び出しがタイムアウト
    ///
    /// タイムアウトはチャンク失敗として扱い、残りのチャンクを中断する。
    #[error("メール送信がタイムアウト: {0}")]
    Timeout(String),

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),
}

/// 送信メールメッセージ
///
/// テンプレートレンダリングの出力。受信者ごとにパーソナライズされ、
/// `BatchMailer` にチャンク単位で渡される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// 送信先メールアドレス
    pub to:        String,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
    /// プレーンテキスト本文
    pub text_body: String,
}
