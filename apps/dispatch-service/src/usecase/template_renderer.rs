//! # テンプレートレンダラー
//!
//! tera テンプレートエンジンで告知メールを HTML/plaintext 両形式で生成する。
//!
//! ## 設計方針
//!
//! - **`include_str!` によるコンパイル時埋め込み**: テンプレートはバイナリに埋め込まれる
//! - **件名パターン**: `{チーム名}: {タイトル}`
//! - **匿名フォールバック**: 受信者の表示名が未設定の場合は
//!   「チームメンバーの皆さま」で始まる

use teamboard_domain::{
    mail::{MailerError, OutboundEmail},
    member::Recipient,
};
use tera::{Context, Tera};

/// テンプレートレンダラー
///
/// tera テンプレートエンジンをラップし、告知と受信者から
/// パーソナライズ済みの [`OutboundEmail`] を生成する。
pub struct AnnouncementTemplateRenderer {
    engine: Tera,
}

impl AnnouncementTemplateRenderer {
    /// 新しいレンダラーインスタンスを作成
    ///
    /// `include_str!` で埋め込んだテンプレートを tera に登録する。
    pub fn new() -> Result<Self, MailerError> {
        let mut engine = Tera::default();

        engine
            .add_raw_templates(vec![
                (
                    "announcement.html",
                    include_str!("../../templates/announcement.html"),
                ),
                (
                    "announcement.txt",
                    include_str!("../../templates/announcement.txt"),
                ),
            ])
            .map_err(|e| MailerError::TemplateFailed(e.to_string()))?;

        Ok(Self { engine })
    }

    /// 受信者 1 名分のメールメッセージを生成する
    pub fn render(
        &self,
        recipient: &Recipient,
        title: &str,
        content: &str,
        team_name: &str,
    ) -> Result<OutboundEmail, MailerError> {
        let mut context = Context::new();
        context.insert("title", title);
        context.insert("content", content);
        context.insert("team_name", team_name);
        if let Some(name) = recipient.name() {
            context.insert("member_name", name);
        }

        let html_body = self
            .engine
            .render("announcement.html", &context)
            .map_err(|e| MailerError::TemplateFailed(e.to_string()))?;

        let text_body = self
            .engine
            .render("announcement.txt", &context)
            .map_err(|e| MailerError::TemplateFailed(e.to_string()))?;

        Ok(OutboundEmail {
            to: recipient.email().to_string(),
            subject: format!("{team_name}: {title}"),
            html_body,
            text_body,
        })
    }
}
