//! # チーム
//!
//! 告知の送信単位となるチームと、そのリーダー権限を定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`Team`] | チーム | 告知の所有者。リーダーのみが告知を送信できる |
//! | [`LeaderId`] | リーダー ID | 認証プロバイダが払い出す操作者 ID |
//!
//! チームメンバーの CRUD は本エンジンの管轄外であり、
//! 受信者リストはリポジトリ経由で読み取るのみ。

use serde::{Deserialize, Serialize};

define_uuid_id! {
    /// チーム ID（一意識別子）
    pub struct TeamId;
}

define_validated_string! {
    /// チーム名
    ///
    /// メール件名の接頭辞（`{チーム名}: {タイトル}`）に使用される。
    pub struct TeamName {
        label: "チーム名",
        max_length: 100,
    }
}

/// リーダー ID
///
/// 認証プロバイダが払い出す操作者 ID。本エンジンはこの文字列を
/// 検証済みのものとして信頼し、チームの `leader_id` との一致のみを確認する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{_0}")]
pub struct LeaderId(String);

impl LeaderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// チームエンティティ
///
/// 告知の所有者。メール送信の認可判定（リーダーか否か）にのみ使用する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    id:        TeamId,
    name:      TeamName,
    leader_id: LeaderId,
}

impl Team {
    pub fn new(id: TeamId, name: TeamName, leader_id: LeaderId) -> Self {
        Self {
            id,
            name,
            leader_id,
        }
    }

    pub fn id(&self) -> &TeamId {
        &self.id
    }

    pub fn name(&self) -> &TeamName {
        &self.name
    }

    pub fn leader_id(&self) -> &LeaderId {
        &self.leader_id
    }

    /// 指定された操作者がこのチームのリーダーかどうか
    pub fn is_led_by(&self, actor: &LeaderId) -> bool {
        &self.leader_id == actor
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn make_team(leader: &str) -> Team {
        Team::new(
            TeamId::new(),
            TeamName::new("開発チーム").unwrap(),
            LeaderId::new(leader),
        )
    }

    #[test]
    fn test_is_led_by_リーダー本人はtrue() {
        let team = make_team("leader-1");

        assert!(team.is_led_by(&LeaderId::new("leader-1")));
    }

    #[test]
    fn test_is_led_by_別の操作者はfalse() {
        let team = make_team("leader-1");

        assert!(!team.is_led_by(&LeaderId::new("someone-else")));
    }

    #[test]
    fn test_チーム名が空文字はエラー() {
        let result = TeamName::new("   ");

        assert!(result.is_err());
    }

    #[test]
    fn test_チーム名は前後の空白を除去する() {
        let name = TeamName::new("  開発チーム  ").unwrap();

        assert_eq!(name.as_str(), "開発チーム");
    }
}
