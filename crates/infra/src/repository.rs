//! # リポジトリ
//!
//! 永続化操作の trait 定義と PostgreSQL 実装。
//!
//! 告知レコードはディスパッチャと webhook リコンサイラが共有する
//! 唯一の可変リソースであり、書き込みはすべて条件付き・アトミックな
//! 単一 SQL 文（または 1 トランザクション）で行う。

pub mod announcement_repository;
pub mod team_repository;

pub use announcement_repository::{
    AnnouncementRepository,
    DeliveryProgress,
    PostgresAnnouncementRepository,
};
pub use team_repository::{PostgresTeamRepository, TeamRepository};
