//! # 受信者
//!
//! 告知メールの受信者と、メールアドレスの構文検証を定義する。
//!
//! ## 設計方針
//!
//! - **構文検証のみ**: `local@domain.tld` 形状の検証。MX レコード等の
//!   実在確認はプロバイダに委ねる
//! - **一括検証**: 受信者リストに 1 件でも不正なアドレスがあれば
//!   送信全体を失敗させる（部分送信を発生させない）ため、
//!   [`Recipient`] は生の文字列を保持し、送信直前に検証する

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// メールアドレス値オブジェクト
///
/// `local@domain.tld` の形状を検証する。
/// 具体的には以下をすべて満たすこと:
///
/// - `@` がちょうど 1 つ存在し、前後が空でない
/// - 空白文字を含まない
/// - ドメイン部が `.` を含み、`.` の前後が空でない
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{_0}")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if !Self::is_valid(&value) {
            return Err(DomainError::Validation(format!(
                "不正なメールアドレスです: {}",
                value
            )));
        }

        Ok(Self(value))
    }

    /// メールアドレスの構文チェック
    pub fn is_valid(value: &str) -> bool {
        if value.chars().any(char::is_whitespace) {
            return false;
        }

        let Some((local, domain)) = value.split_once('@') else {
            return false;
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return false;
        }

        let Some((host, tld)) = domain.rsplit_once('.') else {
            return false;
        };

        !host.is_empty() && !tld.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// 告知メールの受信者
///
/// メンバーストアから解決された `{メールアドレス, 表示名}` の組。
/// アドレスの構文検証は送信直前に一括で行うため、ここでは生の文字列を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    email: String,
    name:  Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// 表示名（未設定の場合は匿名の挨拶文にフォールバックする）
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
