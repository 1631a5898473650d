//! 分析结果
//!
//! 分析服务返回的是松散的 JSON 对象，这里在边界处把它校验成封闭的 [`Action`]。
//! 无法识别的动作一律拒绝，由调用方回退到本地分析。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::moderation::error::{ModerationError, ModerationResult};

/// 审核动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Remove,
    Encrypt,
}

impl Action {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(Action::Allow),
            "remove" => Some(Action::Remove),
            "encrypt" => Some(Action::Encrypt),
            _ => None,
        }
    }

    /// `remove`/`encrypt` 一定修改 DOM，`allow` 一定不修改
    pub fn is_filter(&self) -> bool {
        !matches!(self, Action::Allow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Remove => "remove",
            Action::Encrypt => "encrypt",
        }
    }
}

/// 校验后的分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisVerdict {
    pub action: Action,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<Value>,
}

/// 服务端原始响应
#[derive(Debug, Deserialize)]
struct RawVerdict {
    action: Option<String>,
    #[serde(default)]
    reasons: Vec<Value>,
}

impl AnalysisVerdict {
    pub fn allow() -> Self {
        Self {
            action: Action::Allow,
            reasons: Vec::new(),
            raw_payload: None,
        }
    }

    pub fn remove<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: Action::Remove,
            reasons: reasons.into_iter().map(Into::into).collect(),
            raw_payload: None,
        }
    }

    /// 从服务端 JSON 构造，保留原始负载
    pub fn from_payload(payload: Value) -> ModerationResult<Self> {
        let raw: RawVerdict = serde_json::from_value(payload.clone())
            .map_err(|e| ModerationError::InvalidVerdict(format!("响应格式错误: {}", e)))?;

        let action_text = raw
            .action
            .ok_or_else(|| ModerationError::InvalidVerdict("缺少 action 字段".to_string()))?;
        let action = Action::parse(&action_text)
            .ok_or_else(|| ModerationError::InvalidVerdict(format!("未知动作: {}", action_text)))?;

        // 非字符串的原因项转成文本，不因此拒绝整个结果
        let reasons = raw
            .reasons
            .into_iter()
            .map(|reason| match reason {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect();

        Ok(Self {
            action,
            reasons,
            raw_payload: Some(payload),
        })
    }

    pub fn is_filter(&self) -> bool {
        self.action.is_filter()
    }

    /// 原因列表拼接为一行，用于提示文字
    pub fn reasons_text(&self) -> String {
        if self.reasons.is_empty() {
            "Content filtered".to_string()
        } else {
            self.reasons.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_with_extra_fields() {
        let verdict = AnalysisVerdict::from_payload(json!({
            "action": "Encrypt",
            "reasons": ["Toxic language", 0.93],
            "toxicity": 0.93
        }))
        .unwrap();

        assert_eq!(verdict.action, Action::Encrypt);
        assert_eq!(verdict.reasons, vec!["Toxic language", "0.93"]);
        assert_eq!(verdict.raw_payload.unwrap()["toxicity"], json!(0.93));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result = AnalysisVerdict::from_payload(json!({"action": "quarantine"}));
        assert!(matches!(result, Err(ModerationError::InvalidVerdict(_))));

        let result = AnalysisVerdict::from_payload(json!({"reasons": []}));
        assert!(matches!(result, Err(ModerationError::InvalidVerdict(_))));

        let result = AnalysisVerdict::from_payload(json!("allow"));
        assert!(matches!(result, Err(ModerationError::InvalidVerdict(_))));
    }

    #[test]
    fn test_filter_actions() {
        assert!(!Action::Allow.is_filter());
        assert!(Action::Remove.is_filter());
        assert!(Action::Encrypt.is_filter());
        assert_eq!(AnalysisVerdict::allow().reasons_text(), "Content filtered");
    }
}
