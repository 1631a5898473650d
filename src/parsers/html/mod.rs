//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（节点创建、插入、摘除、文本与属性读写）
//! - `selector`: 排除规则使用的简单选择器
//! - `serializer`: 序列化功能

pub mod dom;
pub mod selector;
pub mod serializer;

pub use dom::{
    add_class, append_child, closest, create_element, create_text_node, descendant_elements,
    detach_node, find_nodes, get_child_node_by_name, get_node_attr, get_node_name,
    get_parent_node, get_style_property, has_class, html_to_dom, insert_after, insert_before,
    is_attached_to, is_element, layout_box, own_text, parse_html_fragment, remove_class,
    set_children, set_node_attr, set_text_content, take_children, text_content,
    LayoutBox,
};
pub use selector::{SelectorList, SimpleSelector};
pub use serializer::{serialize_document, serialize_node};
