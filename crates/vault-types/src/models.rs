use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored script. The server never looks inside `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "owner")]
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// List-view projection of a script. Carries a bounded preview instead of
/// the full code body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub code_length: usize,
    pub code_preview: String,
}

/// A user as exposed over the API: never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn script_serializes_owner_and_camel_case_timestamps() {
        let script = Script {
            id: "scr_abc".into(),
            name: "t".into(),
            code: "print(1)".into(),
            owner_id: "u1".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            updated_at: None,
        };

        let json = serde_json::to_value(&script).unwrap();
        assert_eq!(json["owner"], "u1");
        assert_eq!(json["code"], "print(1)");
        assert!(json.get("createdAt").is_some());
        assert!(json["updatedAt"].is_null());
        assert!(json.get("owner_id").is_none());
    }

    #[test]
    fn summary_uses_camel_case() {
        let summary = ScriptSummary {
            id: "scr_abc".into(),
            name: "t".into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            updated_at: None,
            code_length: 8,
            code_preview: "print(1)".into(),
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["codeLength"], 8);
        assert_eq!(json["codePreview"], "print(1)");
    }
}
