//! 元素登记表
//!
//! 按元素身份（而不是内容）记录已入队或已处理的元素，避免重复分析。
//! 定期重置用于容忍合法变化的内容；已过滤的元素在重置时保留，
//! 否则它们会被再次分析并叠加修改。

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use super::candidate::{element_key, ElementKey};

/// 单个元素的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    Queued,
    Analyzing,
    Allowed,
    Filtered,
}

struct RegistryEntry {
    node: Weak<Node>,
    state: ElementState,
}

impl RegistryEntry {
    /// 地址可能被新节点复用，必须校验弱引用
    fn refers_to(&self, node: &Handle) -> bool {
        self.node
            .upgrade()
            .map(|live| Rc::ptr_eq(&live, node))
            .unwrap_or(false)
    }
}

/// 元素登记表
#[derive(Default)]
pub struct ElementRegistry {
    entries: HashMap<ElementKey, RegistryEntry>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 元素是否已登记
    pub fn contains(&self, node: &Handle) -> bool {
        self.entries
            .get(&element_key(node))
            .map(|entry| entry.refers_to(node))
            .unwrap_or(false)
    }

    /// 尝试登记元素；已登记时返回 `false`
    pub fn try_mark(&mut self, node: &Handle) -> bool {
        if self.contains(node) {
            return false;
        }
        self.entries.insert(
            element_key(node),
            RegistryEntry {
                node: Rc::downgrade(node),
                state: ElementState::Queued,
            },
        );
        true
    }

    pub fn state(&self, node: &Handle) -> Option<ElementState> {
        self.entries
            .get(&element_key(node))
            .filter(|entry| entry.refers_to(node))
            .map(|entry| entry.state)
    }

    /// 更新状态；未登记的元素会被登记
    pub fn set_state(&mut self, node: &Handle, state: ElementState) {
        self.entries.insert(
            element_key(node),
            RegistryEntry {
                node: Rc::downgrade(node),
                state,
            },
        );
    }

    pub fn remove(&mut self, node: &Handle) -> bool {
        if self.contains(node) {
            self.entries.remove(&element_key(node));
            true
        } else {
            false
        }
    }

    /// 定期重置：清除除已过滤元素外的所有登记，以及已释放节点的登记
    pub fn reset_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.state == ElementState::Filtered && entry.node.upgrade().is_some()
        });
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 统计处于指定状态的元素数
    pub fn count_in_state(&self, state: ElementState) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state == state && entry.node.upgrade().is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::create_element;

    #[test]
    fn test_mark_is_idempotent() {
        let mut registry = ElementRegistry::new();
        let p = create_element("p", &[]);

        assert!(registry.try_mark(&p));
        assert!(!registry.try_mark(&p));
        assert_eq!(registry.state(&p), Some(ElementState::Queued));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_identity_not_content() {
        let mut registry = ElementRegistry::new();
        let first = create_element("p", &[]);
        let second = create_element("p", &[]);

        assert!(registry.try_mark(&first));
        assert!(registry.try_mark(&second));
    }

    #[test]
    fn test_reset_keeps_filtered() {
        let mut registry = ElementRegistry::new();
        let allowed = create_element("p", &[]);
        let filtered = create_element("p", &[]);
        registry.set_state(&allowed, ElementState::Allowed);
        registry.set_state(&filtered, ElementState::Filtered);

        assert_eq!(registry.reset_expired(), 1);
        assert!(!registry.contains(&allowed));
        assert_eq!(registry.state(&filtered), Some(ElementState::Filtered));
    }

    #[test]
    fn test_dropped_nodes_are_not_contained() {
        let mut registry = ElementRegistry::new();
        {
            let temp = create_element("img", &[]);
            registry.set_state(&temp, ElementState::Filtered);
        }
        assert_eq!(registry.count_in_state(ElementState::Filtered), 0);
        assert_eq!(registry.reset_expired(), 1);
        assert!(registry.is_empty());
    }
}
