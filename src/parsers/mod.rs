//! # 解析器模块
//!
//! HTML 文档解析、DOM 操作与序列化。审核管道只通过这里的函数读写节点树。

pub mod html;

// Re-export commonly used items for convenience
pub use html::{html_to_dom, serialize_document, SelectorList};
