use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> std::io::Result<RcDom> {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.to_string(),
        None => String::from_utf8_lossy(data).to_string(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 解析 HTML 片段，返回游离（无父节点）的顶层节点
///
/// 片段被包裹进完整文档中解析，再从 `<body>` 中摘出，
/// 这样就不依赖 html5ever 的片段解析入口。
pub fn parse_html_fragment(fragment: &str) -> Vec<Handle> {
    let html = format!("<!DOCTYPE html><html><head></head><body>{fragment}</body></html>");
    let Ok(dom) = html_to_dom(html.as_bytes(), "utf-8") else {
        return Vec::new();
    };

    match find_nodes(&dom.document, vec!["html", "body"]).first() {
        Some(body) => take_children(body),
        None => Vec::new(),
    }
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: Vec<&str>) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let Some(node_name) = node_names.first().copied() else {
        return found_nodes;
    };

    if node_names.len() == 1 {
        if get_node_name(node) == Some(node_name) {
            found_nodes.push(node.clone());
        }

        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names.clone()));
        }
    } else if get_node_name(node) == Some(node_name) {
        let mut new_node_names = node_names;
        new_node_names.remove(0);
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, new_node_names.clone()));
        }
    } else {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names.clone()));
        }
    }

    found_nodes
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children
        .iter()
        .find(|child| get_node_name(child) == Some(node_name));
    matching_children.cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 判断是否为元素节点
pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 获取父节点
///
/// `parent` 是 `Cell<Option<Weak>>`，取出后必须放回。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.as_deref() {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value);
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value.as_deref() {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: StrTendril::from_slice(attr_value),
                });
            }
        }
    };
}

/// 创建游离的元素节点
pub fn create_element(tag_name: &str, attrs: &[(&str, &str)]) -> Handle {
    let attrs = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: StrTendril::from_slice(value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag_name)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建游离的文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 将节点从父节点上摘下
pub fn detach_node(node: &Handle) {
    let weak = node.parent.take();
    if let Some(parent) = weak.and_then(|parent| parent.upgrade()) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
}

/// 追加子节点（已有父节点时先摘下）
pub fn append_child(parent: &Handle, child: &Handle) {
    detach_node(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

fn insert_at_sibling(reference: &Handle, node: &Handle, after: bool) -> bool {
    let Some(parent) = get_parent_node(reference) else {
        return false;
    };

    detach_node(node);

    let mut children = parent.children.borrow_mut();
    let Some(index) = children.iter().position(|child| Rc::ptr_eq(child, reference)) else {
        return false;
    };

    node.parent.set(Some(Rc::downgrade(&parent)));
    children.insert(if after { index + 1 } else { index }, node.clone());
    true
}

/// 在参考节点之前插入；参考节点没有父节点时返回 `false`
pub fn insert_before(reference: &Handle, node: &Handle) -> bool {
    insert_at_sibling(reference, node, false)
}

/// 在参考节点之后插入；参考节点没有父节点时返回 `false`
pub fn insert_after(reference: &Handle, node: &Handle) -> bool {
    insert_at_sibling(reference, node, true)
}

/// 摘下并返回所有子节点
pub fn take_children(node: &Handle) -> Vec<Handle> {
    let children = std::mem::take(&mut *node.children.borrow_mut());
    for child in &children {
        child.parent.set(None);
    }
    children
}

/// 用给定节点列表替换全部子节点
pub fn set_children(node: &Handle, children: Vec<Handle>) {
    take_children(node);
    for child in &children {
        append_child(node, child);
    }
}

/// 用单个文本节点替换全部子节点
pub fn set_text_content(node: &Handle, text: &str) {
    set_children(node, vec![create_text_node(text)]);
}

/// 拼接所有后代文本节点（等价于 `textContent`）
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

/// 只拼接直接子文本节点
pub fn own_text(node: &Handle) -> String {
    node.children
        .borrow()
        .iter()
        .filter_map(|child| match &child.data {
            NodeData::Text { contents } => Some(contents.borrow().to_string()),
            _ => None,
        })
        .collect()
}

/// 前序遍历收集所有元素节点（包含 `root` 自身）
pub fn descendant_elements(root: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    let mut stack = vec![root.clone()];

    while let Some(node) = stack.pop() {
        if is_element(&node) {
            found.push(node.clone());
        }
        for child in node.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }

    found
}

/// 沿父链查找满足条件的最近祖先（包含自身）
pub fn closest<F>(node: &Handle, predicate: F) -> Option<Handle>
where
    F: Fn(&Handle) -> bool,
{
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if is_element(&candidate) && predicate(&candidate) {
            return Some(candidate);
        }
        current = get_parent_node(&candidate);
    }
    None
}

/// 判断 `node` 是否仍挂在以 `root` 为根的树上
pub fn is_attached_to(node: &Handle, root: &Handle) -> bool {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if Rc::ptr_eq(&candidate, root) {
            return true;
        }
        current = get_parent_node(&candidate);
    }
    false
}

/// 获取 class 列表
pub fn get_classes(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_classes(node).iter().any(|class| class == class_name)
}

pub fn add_class(node: &Handle, class_name: &str) {
    let mut classes = get_classes(node);
    if !classes.iter().any(|class| class == class_name) {
        classes.push(class_name.to_string());
        set_node_attr(node, "class", Some(classes.join(" ")));
    }
}

/// 移除 class；列表为空时连同属性一起移除
pub fn remove_class(node: &Handle, class_name: &str) {
    let classes: Vec<String> = get_classes(node)
        .into_iter()
        .filter(|class| class != class_name)
        .collect();
    if classes.is_empty() {
        set_node_attr(node, "class", None);
    } else {
        set_node_attr(node, "class", Some(classes.join(" ")));
    }
}

/// 解析内联样式为 (属性, 值) 列表
pub fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_lowercase();
            if property.is_empty() {
                return None;
            }
            Some((property, value.trim().to_string()))
        })
        .collect()
}

pub fn get_style_property(node: &Handle, property: &str) -> Option<String> {
    let style = get_node_attr(node, "style")?;
    parse_inline_style(&style)
        .into_iter()
        .find(|(name, _)| name == property)
        .map(|(_, value)| value)
}

/// 元素在页面上的占位尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBox {
    pub width: u32,
    pub height: u32,
}

fn parse_pixels(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    let rest = value[digits.len()..].trim();
    if digits.is_empty() || !(rest.is_empty() || rest == "px" || rest.starts_with('.')) {
        return None;
    }
    digits.parse().ok()
}

/// 读取元素尺寸：内联样式优先，其次 `width`/`height` 属性
pub fn layout_box(node: &Handle) -> Option<LayoutBox> {
    let dimension = |name: &str| {
        get_style_property(node, name)
            .and_then(|value| parse_pixels(&value))
            .or_else(|| get_node_attr(node, name).and_then(|value| parse_pixels(&value)))
    };

    Some(LayoutBox {
        width: dimension("width")?,
        height: dimension("height")?,
    })
}
