//! 动作应用器
//!
//! 根据分析结果修改 DOM，并保存足以原样撤销的状态：
//! - 文本：保存原始子节点，替换为占位文本，在元素后插入提示标记
//! - 图片：用等尺寸容器包裹，模糊并叠加遮罩与“显示”按钮
//!
//! 每个元素同一时刻至多一条修改记录，重复过滤会先撤销旧记录。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use base64::{prelude::BASE64_STANDARD, Engine};
use markup5ever_rcdom::{Handle, Node};

use super::placeholder::placeholder_for;
use crate::moderation::analysis::AnalysisVerdict;
use crate::moderation::config::constants;
use crate::moderation::core::PipelineContext;
use crate::moderation::error::{helpers, ModerationError, ModerationResult};
use crate::moderation::pipeline::{element_key, ContentKind, ElementKey, ElementState};
use crate::moderation::storage::{HistoryEntry, HistorySink};
use crate::parsers::html::{
    add_class, append_child, create_element, create_text_node, descendant_elements,
    get_node_attr, get_node_name, get_parent_node, insert_after, insert_before, layout_box,
    set_node_attr, set_text_content, take_children, text_content, LayoutBox,
};

/// 修改前的原始状态
#[derive(Debug)]
pub enum OriginalState {
    /// 原始子节点与其文本
    Text { children: Vec<Handle>, text: String },
    /// 原始内联样式与图片地址
    Image { style: Option<String>, src: String },
}

/// 一次已应用的修改
pub struct AppliedModification {
    pub kind: ContentKind,
    pub(crate) element: Weak<Node>,
    pub original: OriginalState,
    pub verdict: AnalysisVerdict,
    /// 文本旁的提示标记
    pub indicator: Option<Handle>,
    /// 图片遮罩
    pub overlay: Option<Handle>,
    /// 图片容器；结构退化时为 `None`
    pub container: Option<Handle>,
    /// 用户已点击“显示”
    pub revealed: bool,
}

impl AppliedModification {
    pub fn element(&self) -> Option<Handle> {
        self.element.upgrade()
    }

    /// 原始内容的文本形式（图片为地址）
    pub fn original_content(&self) -> &str {
        match &self.original {
            OriginalState::Text { text, .. } => text,
            OriginalState::Image { src, .. } => src,
        }
    }

    /// 可逆编码后的原始内容
    pub fn encoded_original(&self) -> String {
        BASE64_STANDARD.encode(self.original_content())
    }
}

/// 动作应用器
pub struct ActionApplier {
    pub(super) context: Rc<PipelineContext>,
    history: Rc<dyn HistorySink>,
    pub(super) modifications: RefCell<HashMap<ElementKey, AppliedModification>>,
}

impl ActionApplier {
    pub fn new(context: Rc<PipelineContext>, history: Rc<dyn HistorySink>) -> Self {
        Self {
            context,
            history,
            modifications: RefCell::new(HashMap::new()),
        }
    }

    /// 应用分析结果；`allow` 不做任何修改
    pub fn apply(
        &self,
        kind: ContentKind,
        element: &Handle,
        verdict: &AnalysisVerdict,
    ) -> ModerationResult<()> {
        if !verdict.is_filter() {
            return Ok(());
        }

        if !self.context.document.is_attached(element) {
            return Err(helpers::detached_error(
                get_node_name(element).unwrap_or("node"),
            ));
        }

        // 重复过滤：先撤销旧修改，避免叠加
        let previous = self.modifications.borrow_mut().remove(&element_key(element));
        if let Some(previous) = previous {
            tracing::debug!("元素已有修改记录，先撤销再重新应用");
            self.undo_modification(element, previous);
        }

        let modification = match kind {
            ContentKind::Text => self.apply_text(element, verdict),
            ContentKind::Image => self.apply_image(element, verdict),
        };

        let original = modification.original_content().to_string();
        self.modifications
            .borrow_mut()
            .insert(element_key(element), modification);
        self.context
            .registry
            .borrow_mut()
            .set_state(element, ElementState::Filtered);

        self.record(kind, original, verdict);
        tracing::info!(
            "已过滤{}: {}",
            if kind == ContentKind::Text { "文本" } else { "图片" },
            verdict.reasons_text()
        );
        Ok(())
    }

    fn apply_text(&self, element: &Handle, verdict: &AnalysisVerdict) -> AppliedModification {
        // 保存的原文不能含内部元素的占位文本与提示标记
        self.undo_nested(element);
        let text = text_content(element);
        let children = take_children(element);

        set_text_content(element, &placeholder_for(&text));
        add_class(element, constants::FILTERED_CLASS);
        set_node_attr(
            element,
            constants::ORIGINAL_ATTR,
            Some(BASE64_STANDARD.encode(&text)),
        );

        let title = verdict.reasons_text();
        let indicator = create_element(
            "span",
            &[
                ("class", constants::INDICATOR_CLASS),
                (constants::INJECTED_ATTR, "indicator"),
                ("role", "button"),
                ("title", title.as_str()),
            ],
        );
        append_child(&indicator, &create_text_node("⚠"));

        let indicator = if insert_after(element, &indicator) {
            Some(indicator)
        } else {
            helpers::log_error(&helpers::structural_error("无法插入文本提示标记"));
            None
        };

        AppliedModification {
            kind: ContentKind::Text,
            element: Rc::downgrade(element),
            original: OriginalState::Text { children, text },
            verdict: verdict.clone(),
            indicator,
            overlay: None,
            container: None,
            revealed: false,
        }
    }

    fn apply_image(&self, element: &Handle, verdict: &AnalysisVerdict) -> AppliedModification {
        let style = get_node_attr(element, "style");
        let src = get_node_attr(element, "src").unwrap_or_default();
        let footprint = layout_box(element);

        let (container, overlay) = match self.wrap_image(element, footprint, verdict) {
            Ok((container, overlay)) => (Some(container), Some(overlay)),
            Err(e) => {
                // 结构修改失败时退化为只模糊，不加遮罩
                helpers::log_error(&e);
                (None, None)
            }
        };

        set_node_attr(element, "style", Some(blurred_style(style.as_deref())));
        add_class(element, constants::FILTERED_CLASS);
        set_node_attr(
            element,
            constants::ORIGINAL_ATTR,
            Some(BASE64_STANDARD.encode(&src)),
        );

        AppliedModification {
            kind: ContentKind::Image,
            element: Rc::downgrade(element),
            original: OriginalState::Image { style, src },
            verdict: verdict.clone(),
            indicator: None,
            overlay,
            container,
            revealed: false,
        }
    }

    /// 撤销 `element` 内部已有的修改，内层先于外层
    fn undo_nested(&self, element: &Handle) -> usize {
        let nested: Vec<Handle> = descendant_elements(element)
            .into_iter()
            .skip(1)
            .rev()
            .filter(|node| self.is_filtered(node))
            .collect();

        for node in &nested {
            let modification = self.modifications.borrow_mut().remove(&element_key(node));
            if let Some(modification) = modification {
                self.undo_modification(node, modification);
                self.context
                    .registry
                    .borrow_mut()
                    .set_state(node, ElementState::Allowed);
            }
        }

        if !nested.is_empty() {
            tracing::debug!("外层元素被过滤，先撤销内部 {} 条修改", nested.len());
        }
        nested.len()
    }

    /// 用保持原尺寸的容器包裹图片，并在容器内追加遮罩
    fn wrap_image(
        &self,
        element: &Handle,
        footprint: Option<LayoutBox>,
        verdict: &AnalysisVerdict,
    ) -> ModerationResult<(Handle, Handle)> {
        let parent = get_parent_node(element)
            .ok_or_else(|| helpers::structural_error("图片没有父节点"))?;

        if matches!(get_node_name(&parent), Some("picture") | Some("svg")) {
            return Err(helpers::structural_error(format!(
                "图片位于 <{}> 内，无法包裹",
                get_node_name(&parent).unwrap_or_default()
            )));
        }

        let container_style = match footprint {
            Some(LayoutBox { width, height }) => format!(
                "position: relative; display: inline-block; overflow: hidden; width: {}px; height: {}px",
                width, height
            ),
            None => "position: relative; display: inline-block; overflow: hidden".to_string(),
        };
        let container = create_element(
            "div",
            &[
                ("class", constants::IMAGE_CONTAINER_CLASS),
                (constants::INJECTED_ATTR, "container"),
                ("style", container_style.as_str()),
            ],
        );

        if !insert_before(element, &container) {
            return Err(helpers::structural_error("无法插入图片容器"));
        }
        append_child(&container, element);

        let title = verdict.reasons_text();
        let overlay = create_element(
            "div",
            &[
                ("class", constants::OVERLAY_CLASS),
                (constants::INJECTED_ATTR, "overlay"),
                ("title", title.as_str()),
                (
                    "style",
                    "position: absolute; top: 0; left: 0; width: 100%; height: 100%",
                ),
            ],
        );
        let warning = create_element("span", &[]);
        append_child(&warning, &create_text_node("⚠ Image hidden by PageGuard"));
        let show = create_element(
            "button",
            &[
                ("class", constants::SHOW_BUTTON_CLASS),
                (constants::INJECTED_ATTR, "show"),
            ],
        );
        append_child(&show, &create_text_node("Show"));
        append_child(&overlay, &warning);
        append_child(&overlay, &show);
        append_child(&container, &overlay);

        Ok((container, overlay))
    }

    /// 记录历史与统计；存储不可用时只记录日志
    fn record(&self, kind: ContentKind, original: String, verdict: &AnalysisVerdict) {
        self.context.stats.borrow_mut().increment(kind);

        let entry = HistoryEntry::new(
            kind,
            original,
            verdict.reasons.clone(),
            self.context.page_url(),
            self.context.document.domain(),
        );

        let result = self
            .history
            .append(entry)
            .and_then(|()| self.history.increment(kind));
        if let Err(e) = result {
            self.context.report_channel_error(&e);
        }
    }

    /// 点击图片上的“显示”：只移除模糊与遮罩，保留容器与登记状态
    pub fn reveal_image(&self, element: &Handle) -> bool {
        let mut modifications = self.modifications.borrow_mut();
        let Some(modification) = modifications.get_mut(&element_key(element)) else {
            return false;
        };
        let OriginalState::Image { style, .. } = &modification.original else {
            return false;
        };

        set_node_attr(element, "style", style.clone());
        if let Some(overlay) = modification.overlay.take() {
            crate::parsers::html::detach_node(&overlay);
        }
        modification.revealed = true;
        tracing::debug!("用户显示了被模糊的图片");
        true
    }

    /// 点击文本提示标记：在模态框中显示原文
    pub fn reveal_text(&self, element: &Handle) -> ModerationResult<Handle> {
        let modifications = self.modifications.borrow();
        let modification = modifications
            .get(&element_key(element))
            .filter(|modification| modification.kind == ContentKind::Text)
            .ok_or_else(|| ModerationError::InternalError("元素没有文本过滤记录".to_string()))?;

        let body = self
            .context
            .document
            .body()
            .ok_or_else(|| helpers::structural_error("文档没有 <body>"))?;

        let modal = create_element(
            "div",
            &[
                ("class", constants::MODAL_CLASS),
                (constants::INJECTED_ATTR, "modal"),
                ("role", "dialog"),
            ],
        );
        let reasons = create_element("p", &[("class", "pg-modal-reasons")]);
        append_child(&reasons, &create_text_node(&modification.verdict.reasons_text()));
        let original = create_element("blockquote", &[("class", "pg-modal-original")]);
        append_child(&original, &create_text_node(modification.original_content()));
        let close = create_element("button", &[("class", "pg-modal-close")]);
        append_child(&close, &create_text_node("Close"));

        append_child(&modal, &reasons);
        append_child(&modal, &original);
        append_child(&modal, &close);
        append_child(&body, &modal);
        Ok(modal)
    }

    /// 当前的修改记录数
    pub fn modification_count(&self) -> usize {
        self.modifications.borrow().len()
    }

    pub fn is_filtered(&self, element: &Handle) -> bool {
        self.modifications
            .borrow()
            .get(&element_key(element))
            .map(|modification| {
                modification
                    .element()
                    .map(|live| Rc::ptr_eq(&live, element))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// 所有修改的 (类型, 编码后原文, 原因)
    pub fn encoded_originals(&self) -> Vec<(ContentKind, String, Vec<String>)> {
        self.modifications
            .borrow()
            .values()
            .filter(|modification| modification.element().is_some())
            .map(|modification| {
                (
                    modification.kind,
                    modification.encoded_original(),
                    modification.verdict.reasons.clone(),
                )
            })
            .collect()
    }
}

fn blurred_style(original: Option<&str>) -> String {
    match original.map(str::trim).filter(|style| !style.is_empty()) {
        Some(style) => format!("{}; {}", style.trim_end_matches(';'), constants::BLUR_STYLE),
        None => constants::BLUR_STYLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blurred_style_keeps_original() {
        assert_eq!(blurred_style(None), constants::BLUR_STYLE);
        assert_eq!(
            blurred_style(Some("width: 300px;")),
            format!("width: 300px; {}", constants::BLUR_STYLE)
        );
    }
}
