//! # Teamboard ドメイン層
//!
//! 告知メール配信エンジンの中核となるドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! このクレートは DDD（ドメイン駆動設計）の原則に従い、以下を提供する:
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: Announcement, Team）
//! - **値オブジェクト**: 識別子を持たない不変オブジェクト（例: EmailAddress,
//!   BatchId）
//! - **ステートマシン**: 告知のメール配信ステータスを ADT で表現
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! app → infra → domain
//! ```
//!
//! ドメイン層はインフラ層（DB、メール配信プロバイダ）には一切依存しない。
//! これにより、ステートマシンの遷移ルールを純粋な単体テストで検証できる。
//!
//! ## モジュール構成
//!
//! - [`announcement`] - 告知エンティティと配信ステータスのステートマシン
//! - [`team`] - チームとリーダー権限
//! - [`member`] - 受信者とメールアドレス検証
//! - [`mail`] - 送信メールメッセージ
//! - [`delivery`] - プロバイダ webhook の配信イベント種別
//! - [`clock`] - テスト可能な時刻プロバイダ
//! - [`error`] - ドメイン層で発生するエラーの定義

#[macro_use]
mod macros;

pub mod announcement;
pub mod clock;
pub mod delivery;
pub mod error;
pub mod mail;
pub mod member;
pub mod team;

pub use error::DomainError;
