//! # Webhook 署名検証
//!
//! メール配信プロバイダからの配信イベント webhook は、本システム唯一の
//! デフォルト非認証な受信面であり、信頼は署名検証のみに依存する。
//!
//! ## 検証方式
//!
//! プロバイダはヘッダ 3 点（メッセージ ID、タイムスタンプ、署名）を付与する。
//! 署名は `"{メッセージID}.{タイムスタンプ}.{ボディ}"` に対する
//! HMAC-SHA256 を base64 エンコードしたもので、署名ヘッダには
//! `v1,<base64>` 形式のエントリが空白区切りで複数含まれうる
//! （シークレットローテーション対応）。
//!
//! ## 設計方針
//!
//! - **fail closed**: シークレット未設定・検証失敗時は本文を一切処理しない
//! - **定数時間比較**: `subtle::ConstantTimeEq` でタイミング攻撃を防ぐ
//! - **リプレイ対策**: タイムスタンプの許容ずれは ±5 分

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// タイムスタンプの許容ずれ（秒）
const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

/// シークレットの base64 部分に付く慣習的な接頭辞
const SECRET_PREFIX: &str = "whsec_";

/// Webhook 検証エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// 署名シークレットが設定されていない（fail closed）
    #[error("webhook 署名シークレットが設定されていません")]
    NotConfigured,

    /// 署名がヘッダの署名と一致しない
    #[error("webhook 署名の検証に失敗しました")]
    InvalidSignature,

    /// タイムスタンプが許容範囲外（リプレイの疑い）
    #[error("webhook タイムスタンプが許容範囲外です")]
    StaleTimestamp,
}

/// Webhook 署名検証器
///
/// 設定ファイルのシークレットから構築し、受信ごとに
/// [`verify`](WebhookSignatureVerifier::verify) を呼び出す。
pub struct WebhookSignatureVerifier {
    secret:    Vec<u8>,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSignatureVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookSignatureVerifier {
    /// シークレット文字列から検証器を構築する
    ///
    /// `whsec_` 接頭辞は取り除いたうえで base64 デコードする。
    ///
    /// # Errors
    ///
    /// - `WebhookError::NotConfigured`: シークレットが空、または
    ///   base64 として不正な場合
    pub fn new(secret: &str) -> Result<Self, WebhookError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        if encoded.is_empty() {
            return Err(WebhookError::NotConfigured);
        }

        let secret = BASE64
            .decode(encoded)
            .map_err(|_| WebhookError::NotConfigured)?;

        Ok(Self {
            secret,
            tolerance: Duration::seconds(TIMESTAMP_TOLERANCE_SECS),
        })
    }

    /// ヘッダ 3 点とボディから署名を検証する
    ///
    /// # 引数
    ///
    /// - `message_id`: プロバイダのメッセージ ID ヘッダ
    /// - `timestamp`: Unix 秒のタイムスタンプヘッダ
    /// - `signature_header`: `v1,<base64>` エントリの空白区切りリスト
    /// - `payload`: リクエストボディ（生バイト列）
    /// - `now`: 現在時刻（タイムスタンプ許容範囲の判定に使用）
    pub fn verify(
        &self,
        message_id: &str,
        timestamp: &str,
        signature_header: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        // 1. タイムスタンプの検証（リプレイ対策）
        let unix_secs: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::InvalidSignature)?;
        let sent_at =
            DateTime::from_timestamp(unix_secs, 0).ok_or(WebhookError::InvalidSignature)?;
        if (now - sent_at).abs() > self.tolerance {
            return Err(WebhookError::StaleTimestamp);
        }

        // 2. 期待される署名を計算する
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| WebhookError::NotConfigured)?;
        mac.update(message_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = BASE64.encode(mac.finalize().into_bytes());

        // 3. ヘッダ内のいずれかのエントリと定数時間比較で一致すれば成功
        let matched = signature_header
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .any(|(_, candidate)| {
                bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
            });

        if matched {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }
}
