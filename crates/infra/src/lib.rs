//! # Teamboard インフラ層
//!
//! データベース・メール配信プロバイダなど外部システムとの境界を実装する。
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL 接続プールとマイグレーション
//! - [`repository`] - 告知・チームの永続化（trait + PostgreSQL 実装）
//! - [`mailer`] - バッチメール送信（trait + HTTP / Noop 実装）
//! - [`webhook_signature`] - プロバイダ webhook の署名検証
//! - [`error`] - インフラ層エラー
//! - [`mock`] - テスト用インメモリ実装（`test-utils` feature）
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: ユースケース層は `Arc<dyn Trait>` 経由で
//!   依存し、テストではインメモリモックに差し替える
//! - **条件付き更新**: 告知レコードは共有される唯一の可変リソースであり、
//!   ステータス遷移・カウンタ加算・失敗リスト追記はすべて
//!   単一 SQL 文のアトミック操作として実装する

pub mod db;
pub mod error;
pub mod mailer;
pub mod repository;
pub mod webhook_signature;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::{InfraError, InfraErrorKind};
