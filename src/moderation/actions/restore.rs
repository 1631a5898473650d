//! 恢复与找回
//!
//! 全局恢复在关闭保护时执行：按修改记录由深到浅逐个撤销，
//! 然后清理遗留的注入节点。没有修改记录的标记元素静默跳过。
//! 找回用于外部送回的原文：优先替换仍带原文属性的已过滤元素，
//! 找不到任何已过滤元素时改为在页面上显示临时通知。

use std::rc::Rc;

use markup5ever_rcdom::Handle;

use super::applier::{ActionApplier, AppliedModification, OriginalState};
use crate::moderation::config::constants;
use crate::moderation::error::{helpers, ModerationResult};
use crate::moderation::pipeline::{element_key, ContentKind, ElementState};
use crate::parsers::html::{
    append_child, create_element, create_text_node, descendant_elements, detach_node,
    get_node_attr, get_node_name, get_parent_node, has_class, insert_before, remove_class,
    set_children, set_node_attr, set_text_content, take_children,
};

/// 全局恢复结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
    pub injected_removed: usize,
}

/// 找回结果
#[derive(Debug, Clone)]
pub enum RecoveryOutcome {
    /// 已替换某个已过滤元素的内容
    Replaced,
    /// 没有已过滤元素，改为显示通知
    Notified(Handle),
}

impl ActionApplier {
    /// 撤销单条修改，恢复原始内容与样式
    pub(crate) fn undo_modification(&self, element: &Handle, modification: AppliedModification) {
        match modification.original {
            OriginalState::Text { children, .. } => {
                set_children(element, children);
            }
            OriginalState::Image { style, .. } => {
                set_node_attr(element, "style", style);
                if let Some(container) = &modification.container {
                    // 把图片放回容器原来的位置
                    if insert_before(container, element) {
                        detach_node(container);
                    } else {
                        helpers::log_error(&helpers::structural_error("无法解除图片容器"));
                    }
                }
            }
        }

        remove_class(element, constants::FILTERED_CLASS);
        set_node_attr(element, constants::ORIGINAL_ATTR, None);

        if let Some(indicator) = &modification.indicator {
            detach_node(indicator);
        }
        if let Some(overlay) = &modification.overlay {
            detach_node(overlay);
        }
    }

    /// 全局恢复：按修改记录撤销页面上所有过滤，深层元素先于外层
    pub fn restore_all(&self) -> RestoreReport {
        let mut report = RestoreReport::default();
        let document = self.context.document.document().clone();

        let mut live: Vec<(usize, Handle)> = self
            .modifications
            .borrow()
            .values()
            .filter_map(|modification| modification.element())
            .filter(|element| self.context.document.is_attached(element))
            .map(|element| (node_depth(&element), element))
            .collect();
        live.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, element) in live {
            let modification = self.modifications.borrow_mut().remove(&element_key(&element));
            if let Some(modification) = modification {
                self.undo_modification(&element, modification);
                self.context
                    .registry
                    .borrow_mut()
                    .set_state(&element, ElementState::Allowed);
                report.restored += 1;
            }
        }

        // 元素已离开文档的记录不再有意义
        let stale = self.modifications.borrow().len();
        if stale > 0 {
            tracing::debug!("丢弃 {} 条脱离文档的修改记录", stale);
            self.modifications.borrow_mut().clear();
        }

        // 没有修改记录的过滤标记静默跳过
        report.skipped = descendant_elements(&document)
            .iter()
            .filter(|node| has_class(node, constants::FILTERED_CLASS))
            .count();
        if report.skipped > 0 {
            tracing::warn!("{} 个过滤标记没有对应的修改记录，跳过", report.skipped);
        }

        report.injected_removed = self.remove_injected_nodes(&document);
        tracing::info!(
            "全局恢复完成: 恢复 {} 个, 跳过 {} 个",
            report.restored,
            report.skipped
        );
        report
    }

    /// 移除遗留的注入节点（提示、遮罩、模态框、通知）；容器先解包
    fn remove_injected_nodes(&self, document: &Handle) -> usize {
        let injected: Vec<Handle> = descendant_elements(document)
            .into_iter()
            .filter(|node| get_node_attr(node, constants::INJECTED_ATTR).is_some())
            .collect();

        let mut removed = 0;
        for node in injected {
            if get_node_attr(&node, constants::INJECTED_ATTR).as_deref() == Some("container") {
                for child in take_children(&node) {
                    if get_node_attr(&child, constants::INJECTED_ATTR).is_none() {
                        insert_before(&node, &child);
                    }
                }
            }
            detach_node(&node);
            removed += 1;
        }
        removed
    }

    /// 用外部送回的原文替换最相关的已过滤文本元素
    pub fn apply_recovered_content(&self, text: &str) -> ModerationResult<RecoveryOutcome> {
        match self.find_recovery_target() {
            Some(element) => {
                let modification = self.modifications.borrow_mut().remove(&element_key(&element));
                if let Some(modification) = modification {
                    // 丢弃保存的原始子节点，内容以送回的文本为准
                    self.undo_modification(&element, modification);
                } else {
                    remove_class(&element, constants::FILTERED_CLASS);
                    set_node_attr(&element, constants::ORIGINAL_ATTR, None);
                }
                set_text_content(&element, text);
                self.context
                    .registry
                    .borrow_mut()
                    .set_state(&element, ElementState::Allowed);
                tracing::info!("已将找回的内容放回页面");
                Ok(RecoveryOutcome::Replaced)
            }
            None => {
                let notification = self.show_notification(text)?;
                Ok(RecoveryOutcome::Notified(notification))
            }
        }
    }

    /// 优先选择带原文属性的已过滤文本元素
    fn find_recovery_target(&self) -> Option<Handle> {
        let document = self.context.document.document().clone();
        let filtered: Vec<Handle> = descendant_elements(&document)
            .into_iter()
            .filter(|node| has_class(node, constants::FILTERED_CLASS))
            .filter(|node| get_node_name(node) != Some("img"))
            .filter(|node| {
                self.modifications
                    .borrow()
                    .get(&element_key(node))
                    .map_or(true, |modification| modification.kind == ContentKind::Text)
            })
            .collect();

        filtered
            .iter()
            .find(|node| get_node_attr(node, constants::ORIGINAL_ATTR).is_some())
            .or_else(|| filtered.first())
            .map(Rc::clone)
    }

    /// 在页面上显示临时通知，由调用方负责到期移除
    pub fn show_notification(&self, text: &str) -> ModerationResult<Handle> {
        let body = self
            .context
            .document
            .body()
            .ok_or_else(|| helpers::structural_error("文档没有 <body>"))?;

        let notification = create_element(
            "div",
            &[
                ("class", constants::NOTIFICATION_CLASS),
                (constants::INJECTED_ATTR, "notification"),
                ("role", "status"),
            ],
        );
        let title = create_element("strong", &[]);
        append_child(&title, &create_text_node("Recovered content"));
        let content = create_element("p", &[]);
        append_child(&content, &create_text_node(text));
        append_child(&notification, &title);
        append_child(&notification, &content);
        append_child(&body, &notification);

        tracing::info!("没有可替换的已过滤元素，改为显示通知");
        Ok(notification)
    }
}

fn node_depth(node: &Handle) -> usize {
    let mut depth = 0;
    let mut current = get_parent_node(node);
    while let Some(parent) = current {
        depth += 1;
        current = get_parent_node(&parent);
    }
    depth
}
