//! 简单选择器匹配
//!
//! 只支持排除规则需要的子集：`tag`、`.class`、`#id`、`[attr]`、`[attr=value]`
//! 及其组合（如 `div.menu`、`a[role=button]`），多个选择器用逗号分隔。
//! 不支持后代/子代组合符。

use markup5ever_rcdom::Handle;

use super::dom::{get_classes, get_node_attr, get_node_name};

/// 单个复合选择器
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

/// 逗号分隔的选择器列表
#[derive(Debug, Clone, Default)]
pub struct SelectorList {
    selectors: Vec<SimpleSelector>,
}

impl SimpleSelector {
    /// 解析单个复合选择器；遇到不支持的语法返回 `None`
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() || input.contains(char::is_whitespace) || input.contains('>') {
            return None;
        }

        let mut selector = SimpleSelector::default();
        let mut chars = input.chars().peekable();

        let mut tag = String::new();
        while let Some(&c) = chars.peek() {
            if c == '.' || c == '#' || c == '[' {
                break;
            }
            tag.push(c);
            chars.next();
        }
        if !tag.is_empty() && tag != "*" {
            selector.tag = Some(tag.to_lowercase());
        }

        while let Some(c) = chars.next() {
            match c {
                '.' | '#' => {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next == '.' || next == '#' || next == '[' {
                            break;
                        }
                        name.push(next);
                        chars.next();
                    }
                    if name.is_empty() {
                        return None;
                    }
                    if c == '.' {
                        selector.classes.push(name);
                    } else {
                        selector.id = Some(name);
                    }
                }
                '[' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == ']' {
                            closed = true;
                            break;
                        }
                        body.push(next);
                    }
                    if !closed || body.is_empty() {
                        return None;
                    }
                    match body.split_once('=') {
                        Some((name, value)) => {
                            let value = value.trim_matches(|c| c == '"' || c == '\'');
                            selector
                                .attrs
                                .push((name.trim().to_lowercase(), Some(value.to_string())));
                        }
                        None => selector.attrs.push((body.trim().to_lowercase(), None)),
                    }
                }
                _ => return None,
            }
        }

        Some(selector)
    }

    /// 判断元素是否匹配
    pub fn matches(&self, node: &Handle) -> bool {
        let Some(name) = get_node_name(node) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if !name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if get_node_attr(node, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let classes = get_classes(node);
            if !self.classes.iter().all(|class| classes.contains(class)) {
                return false;
            }
        }

        self.attrs.iter().all(|(attr, expected)| {
            match (get_node_attr(node, attr), expected) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => &actual == expected,
                (None, _) => false,
            }
        })
    }
}

impl SelectorList {
    /// 解析选择器列表，无法解析的项记录日志后忽略
    pub fn parse<S: AsRef<str>>(selectors: &[S]) -> Self {
        let selectors = selectors
            .iter()
            .flat_map(|group| group.as_ref().split(',').map(str::to_string).collect::<Vec<_>>())
            .filter_map(|raw| {
                let parsed = SimpleSelector::parse(&raw);
                if parsed.is_none() && !raw.trim().is_empty() {
                    tracing::warn!("忽略不支持的选择器: {}", raw.trim());
                }
                parsed
            })
            .collect();

        Self { selectors }
    }

    pub fn matches(&self, node: &Handle) -> bool {
        self.selectors.iter().any(|selector| selector.matches(node))
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}
