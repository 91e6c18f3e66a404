//! Noop バッチメール送信実装
//!
//! 実際には送信せず、ログ出力のみ行う。プロバイダの API キーを
//! 用意できない開発環境で使用する。

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use teamboard_domain::{
    announcement::BatchId,
    mail::{MailerError, OutboundEmail},
};

use super::BatchMailer;

/// Noop バッチメール送信
///
/// 呼び出しごとに連番のバッチ ID を払い出す。
#[derive(Default)]
pub struct NoopBatchMailer {
    counter: AtomicU64,
}

impl NoopBatchMailer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchMailer for NoopBatchMailer {
    async fn send_batch(&self, emails: &[OutboundEmail]) -> Result<BatchId, MailerError> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            chunk_size = emails.len(),
            batch_seq = seq,
            "Noop バックエンド: メールは送信されません"
        );
        Ok(BatchId::new(format!("noop-batch-{seq}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_呼び出しごとに連番のバッチidを払い出す() {
        let mailer = NoopBatchMailer::new();
        let email = OutboundEmail {
            to:        "tanaka@example.com".to_string(),
            subject:   "テスト".to_string(),
            html_body: "<p>本文</p>".to_string(),
            text_body: "本文".to_string(),
        };

        let first = mailer.send_batch(&[email.clone()]).await.unwrap();
        let second = mailer.send_batch(&[email]).await.unwrap();

        assert_eq!(first.as_str(), "noop-batch-1");
        assert_eq!(second.as_str(), "noop-batch-2");
    }
}
