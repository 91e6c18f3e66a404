//! # 配信イベント
//!
//! メール配信プロバイダが webhook で通知するイベント種別を定義する。
//!
//! ## イベントと状態への影響
//!
//! | イベント | 影響 |
//! |---------|------|
//! | `email.sent` | なし（情報のみ） |
//! | `email.delivered` | `delivered_count` を +1。全件到達で sending → sent |
//! | `email.bounced` / `email.complained` | 失敗アドレスを記録し partially_failed へ |
//! | その他 | 無視（ログのみ） |

/// プロバイダ webhook の配信イベント種別
///
/// 未知の `type` 文字列はエラーにせず [`DeliveryEvent::Unknown`] として保持し、
/// 呼び出し側がログ出力のうえ無視できるようにする。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// プロバイダがメールを受理した（状態変更なし）
    Sent,
    /// 受信者のメールサーバーに到達した
    Delivered,
    /// バウンスした（宛先不明など）
    Bounced,
    /// 受信者が迷惑メール報告した
    Complained,
    /// 未対応のイベント種別
    Unknown(String),
}

impl DeliveryEvent {
    /// webhook ペイロードの `type` 文字列からイベント種別を判定する
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "email.sent" => Self::Sent,
            "email.delivered" => Self::Delivered,
            "email.bounced" => Self::Bounced,
            "email.complained" => Self::Complained,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// 失敗イベント（バウンス・迷惑メール報告）かどうか
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Bounced | Self::Complained)
    }
}
