//! 本地启发式分析器
//!
//! 分析服务不可用时使用。词表比远程服务窄，只做大小写不敏感的整词匹配，
//! 尽量减少离线时的误判。图片默认放行，只有地址中出现敏感关键词才过滤。

use std::sync::OnceLock;

use regex::Regex;

use crate::moderation::analysis::verdict::AnalysisVerdict;
use crate::moderation::config::constants;

/// 本地启发式分析器
pub struct LocalHeuristicAnalyzer {
    profanity_words: Vec<String>,
    hate_speech_terms: Vec<String>,
    sensitive_keywords: Vec<String>,
    regex_cache: RegexCache,
}

#[derive(Default)]
struct RegexCache {
    profanity_regex: OnceLock<Option<Regex>>,
    hate_speech_regex: OnceLock<Option<Regex>>,
}

impl Default for LocalHeuristicAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHeuristicAnalyzer {
    /// 使用内置词表创建
    pub fn new() -> Self {
        Self::with_terms(
            constants::PROFANITY_WORDS,
            constants::HATE_SPEECH_TERMS,
            constants::SENSITIVE_IMAGE_KEYWORDS,
        )
    }

    pub fn with_terms<S: AsRef<str>>(
        profanity_words: &[S],
        hate_speech_terms: &[S],
        sensitive_keywords: &[S],
    ) -> Self {
        let normalize = |terms: &[S]| -> Vec<String> {
            terms
                .iter()
                .map(|term| term.as_ref().trim().to_lowercase())
                .filter(|term| !term.is_empty())
                .collect()
        };

        Self {
            profanity_words: normalize(profanity_words),
            hate_speech_terms: normalize(hate_speech_terms),
            sensitive_keywords: normalize(sensitive_keywords),
            regex_cache: RegexCache::default(),
        }
    }

    /// 分析文本
    pub fn analyze_text(&self, text: &str) -> AnalysisVerdict {
        let mut reasons = Vec::new();

        let profanity = self
            .regex_cache
            .profanity_regex
            .get_or_init(|| build_word_regex(&self.profanity_words));
        if let Some(found) = profanity.as_ref().and_then(|regex| regex.find(text)) {
            reasons.push(format!("Profanity detected: \"{}\"", found.as_str()));
        }

        let hate_speech = self
            .regex_cache
            .hate_speech_regex
            .get_or_init(|| build_word_regex(&self.hate_speech_terms));
        if let Some(found) = hate_speech.as_ref().and_then(|regex| regex.find(text)) {
            reasons.push(format!("Hate speech detected: \"{}\"", found.as_str()));
        }

        if reasons.is_empty() {
            AnalysisVerdict::allow()
        } else {
            tracing::debug!("本地分析命中: {:?}", reasons);
            AnalysisVerdict::remove(reasons)
        }
    }

    /// 分析图片地址
    ///
    /// 地址按非字母数字字符切分后逐段比较，`sextant.png` 不会命中 `sex` 一类的关键词。
    pub fn analyze_image_url(&self, image_url: &str) -> AnalysisVerdict {
        let lowered = image_url.to_lowercase();
        let matched = lowered
            .split(|c: char| !c.is_alphanumeric())
            .find(|token| self.sensitive_keywords.iter().any(|keyword| keyword == token));

        match matched {
            Some(keyword) => AnalysisVerdict::remove([format!(
                "Image URL contains sensitive keyword: \"{}\"",
                keyword
            )]),
            None => AnalysisVerdict::allow(),
        }
    }
}

/// 构建整词匹配正则；短语内部的空白匹配任意空白
fn build_word_regex(terms: &[String]) -> Option<Regex> {
    if terms.is_empty() {
        return None;
    }

    let alternatives: Vec<String> = terms
        .iter()
        .map(|term| {
            term.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));

    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!("本地词表正则构建失败: {}", e);
            None
        }
    }
}
