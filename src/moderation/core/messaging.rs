//! 扩展消息
//!
//! 外部（弹窗、后台）只能通过这些命令修改管道的开关与后端状态。
//! 每条命令同步处理，并返回一个小的应答对象。

use serde::{Deserialize, Serialize};

use crate::moderation::pipeline::ContentKind;
use crate::moderation::storage::ModerationStats;

/// 入站命令，按 `action` 字段区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    ToggleProtection { enabled: bool },
    GetEncryptedContent,
    ApplyRecoveredContent { text: String },
    GetStatus,
    BackendStatus { available: bool },
}

/// 可逆编码后的已过滤内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedItem {
    pub kind: ContentKind,
    /// base64 编码的原始内容
    pub content: String,
    pub reasons: Vec<String>,
}

/// 命令应答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    pub enabled: bool,
    pub backend_available: bool,
    pub stats: ModerationStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<EncryptedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn with_items(mut self, items: Vec<EncryptedItem>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.success = false;
        self.error = Some(error.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let command: Command =
            serde_json::from_str(r#"{"action":"toggleProtection","enabled":false}"#).unwrap();
        assert_eq!(command, Command::ToggleProtection { enabled: false });

        let command: Command = serde_json::from_str(r#"{"action":"getStatus"}"#).unwrap();
        assert_eq!(command, Command::GetStatus);

        let command: Command =
            serde_json::from_str(r#"{"action":"applyRecoveredContent","text":"hello"}"#).unwrap();
        assert_eq!(
            command,
            Command::ApplyRecoveredContent {
                text: "hello".to_string()
            }
        );

        assert!(serde_json::from_str::<Command>(r#"{"action":"selfDestruct"}"#).is_err());
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let response = CommandResponse {
            success: true,
            enabled: true,
            backend_available: false,
            stats: ModerationStats::default(),
            items: None,
            outcome: None,
            error: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["backendAvailable"], serde_json::json!(false));
        assert!(json.get("items").is_none());
        assert!(json.get("error").is_none());
    }
}
