//! HTTP バッチメール送信実装
//!
//! メール配信プロバイダのバッチ送信 API（`POST /emails/batch`）を呼び出す。
//! 本番環境で使用する。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use teamboard_domain::{
    announcement::BatchId,
    mail::{MailerError, OutboundEmail},
};

use super::BatchMailer;

/// プロバイダに送る 1 通分のリクエストボディ
#[derive(Debug, Serialize)]
struct BatchEmailRequest<'a> {
    from:    &'a str,
    to:      [&'a str; 1],
    subject: &'a str,
    html:    &'a str,
    text:    &'a str,
}

/// バッチ送信 API のレスポンスボディ
#[derive(Debug, Deserialize)]
struct BatchSendResponse {
    id: String,
}

/// HTTP バッチメール送信
///
/// `reqwest::Client` をラップし、Bearer 認証付きでプロバイダの
/// バッチ送信 API を呼び出す。タイムアウトはチャンク失敗として扱われ、
/// 呼び出し側が残りのチャンクを中断する。
pub struct HttpBatchMailer {
    client:       reqwest::Client,
    api_base_url: String,
    api_key:      String,
    from_address: String,
}

impl HttpBatchMailer {
    /// 新しい HTTP 送信インスタンスを作成
    ///
    /// # 引数
    ///
    /// - `api_base_url`: プロバイダ API のベース URL
    /// - `api_key`: Bearer 認証用の API キー
    /// - `from_address`: 送信元メールアドレス（プロバイダで検証済みであること）
    /// - `timeout`: 1 チャンク送信あたりのタイムアウト
    pub fn new(
        api_base_url: impl Into<String>,
        api_key: impl Into<String>,
        from_address: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailerError::SendFailed(format!("HTTP クライアント構築失敗: {e}")))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            api_key: api_key.into(),
            from_address: from_address.into(),
        })
    }
}

#[async_trait]
impl BatchMailer for HttpBatchMailer {
    async fn send_batch(&self, emails: &[OutboundEmail]) -> Result<BatchId, MailerError> {
        let body: Vec<BatchEmailRequest<'_>> = emails
            .iter()
            .map(|email| BatchEmailRequest {
                from:    &self.from_address,
                to:      [&email.to],
                subject: &email.subject,
                html:    &email.html_body,
                text:    &email.text_body,
            })
            .collect();

        let url = format!("{}/emails/batch", self.api_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MailerError::Timeout(format!("バッチ送信 API: {e}"))
                } else {
                    MailerError::SendFailed(format!("バッチ送信 API 呼び出し失敗: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MailerError::SendFailed(format!(
                "バッチ送信 API がエラーを返しました: {status} {detail}"
            )));
        }

        let parsed: BatchSendResponse = response
            .json()
            .await
            .map_err(|e| MailerError::SendFailed(format!("レスポンスのパース失敗: {e}")))?;

        Ok(BatchId::new(parsed.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpBatchMailer>();
    }

    #[test]
    fn test_リクエストボディのjson形状が正しい() {
        let request = BatchEmailRequest {
            from:    "noreply@teamboard.example.com",
            to:      ["tanaka@example.com"],
            subject: "開発チーム: 新機能のお知らせ",
            html:    "<p>本文</p>",
            text:    "本文",
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["from"], "noreply@teamboard.example.com");
        assert_eq!(json["to"][0], "tanaka@example.com");
        assert_eq!(json["subject"], "開発チーム: 新機能のお知らせ");
    }
}
