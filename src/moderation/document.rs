//! 活动文档
//!
//! 持有 DOM 树，并把外部对文档的结构修改、属性修改转成变更记录推送给订阅者，
//! 相当于页面里的 MutationObserver。审核管道自身注入的节点不经过这里，
//! 因此不会触发新的变更通知。

use std::cell::RefCell;
use std::fmt;

use markup5ever_rcdom::{Handle, RcDom};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use url::Url;

use crate::moderation::error::{ModerationError, ModerationResult};
use crate::parsers::html::{
    append_child, descendant_elements, detach_node, find_nodes, get_node_name, html_to_dom,
    is_attached_to, parse_html_fragment, serialize_document, set_node_attr,
};

/// 单条变更记录
#[derive(Clone)]
pub enum MutationRecord {
    /// 子节点被插入
    ChildList { target: Handle, added: Vec<Handle> },
    /// 属性被修改
    Attribute { target: Handle, name: String },
}

impl fmt::Debug for MutationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationRecord::ChildList { target, added } => f
                .debug_struct("ChildList")
                .field("target", &get_node_name(target))
                .field("added", &added.len())
                .finish(),
            MutationRecord::Attribute { target, name } => f
                .debug_struct("Attribute")
                .field("target", &get_node_name(target))
                .field("name", name)
                .finish(),
        }
    }
}

/// 变更批次
pub type MutationBatch = Vec<MutationRecord>;

/// 活动文档
pub struct LiveDocument {
    dom: RcDom,
    page_url: Url,
    subscribers: RefCell<Vec<UnboundedSender<MutationBatch>>>,
}

impl LiveDocument {
    /// 解析 HTML 文本
    pub fn parse(html: &str, page_url: &str) -> ModerationResult<Self> {
        Self::from_bytes(html.as_bytes(), "utf-8", page_url)
    }

    /// 按给定编码解析 HTML 字节
    pub fn from_bytes(data: &[u8], encoding: &str, page_url: &str) -> ModerationResult<Self> {
        let page_url = Url::parse(page_url)
            .map_err(|e| ModerationError::ParseError(format!("无效的页面地址 {}: {}", page_url, e)))?;
        let dom = html_to_dom(data, encoding)
            .map_err(|e| ModerationError::ParseError(format!("HTML解析失败: {}", e)))?;

        Ok(Self {
            dom,
            page_url,
            subscribers: RefCell::new(Vec::new()),
        })
    }

    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    /// 页面域名，没有主机名时为空
    pub fn domain(&self) -> String {
        self.page_url.host_str().unwrap_or_default().to_string()
    }

    pub fn body(&self) -> Option<Handle> {
        find_nodes(&self.dom.document, vec!["html", "body"]).pop()
    }

    /// 节点是否仍在文档中
    pub fn is_attached(&self, node: &Handle) -> bool {
        is_attached_to(node, &self.dom.document)
    }

    /// 按标签名查找文档中的所有元素
    pub fn elements_by_tag(&self, tag_name: &str) -> Vec<Handle> {
        descendant_elements(&self.dom.document)
            .into_iter()
            .filter(|node| get_node_name(node) == Some(tag_name))
            .collect()
    }

    /// 订阅变更通知；接收端被丢弃后自动退订
    pub fn subscribe(&self) -> UnboundedReceiver<MutationBatch> {
        let (sender, receiver) = unbounded_channel();
        self.subscribers.borrow_mut().push(sender);
        receiver
    }

    /// 将 HTML 片段追加到 `parent` 下，返回插入的顶层节点
    pub fn insert_html(&self, parent: &Handle, fragment: &str) -> Vec<Handle> {
        let added = parse_html_fragment(fragment);
        for node in &added {
            append_child(parent, node);
        }

        if !added.is_empty() {
            self.notify(vec![MutationRecord::ChildList {
                target: parent.clone(),
                added: added.clone(),
            }]);
        }
        added
    }

    /// 追加已有节点
    pub fn append_node(&self, parent: &Handle, node: &Handle) {
        append_child(parent, node);
        self.notify(vec![MutationRecord::ChildList {
            target: parent.clone(),
            added: vec![node.clone()],
        }]);
    }

    /// 修改属性；`None` 表示移除
    pub fn set_attribute(&self, node: &Handle, name: &str, value: Option<&str>) {
        set_node_attr(node, name, value.map(str::to_string));
        self.notify(vec![MutationRecord::Attribute {
            target: node.clone(),
            name: name.to_string(),
        }]);
    }

    /// 移除节点（观察器不关心删除，不产生通知）
    pub fn remove_node(&self, node: &Handle) {
        detach_node(node);
    }

    /// 向所有订阅者推送一批变更
    pub fn notify(&self, batch: MutationBatch) {
        self.subscribers
            .borrow_mut()
            .retain(|sender| sender.send(batch.clone()).is_ok());
    }

    /// 序列化整个文档
    pub fn serialize(&self) -> ModerationResult<Vec<u8>> {
        serialize_document(&self.dom.document, "utf-8")
            .map_err(|e| ModerationError::SerializationError(format!("文档序列化失败: {}", e)))
    }

    pub fn to_html_string(&self) -> ModerationResult<String> {
        let bytes = self.serialize()?;
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_html_notifies_subscribers() {
        let document =
            LiveDocument::parse("<html><body><div id=feed></div></body></html>", "https://example.com/")
                .unwrap();
        let mut receiver = document.subscribe();
        let feed = document.elements_by_tag("div").pop().unwrap();

        let added = document.insert_html(&feed, "<p>first</p><img src=\"a.png\">");
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|node| document.is_attached(node)));

        let batch = receiver.try_recv().unwrap();
        assert!(matches!(&batch[0], MutationRecord::ChildList { added, .. } if added.len() == 2));
    }

    #[test]
    fn test_attribute_change_and_removal() {
        let document =
            LiveDocument::parse("<body><img src=\"a.png\"></body>", "https://example.com/page")
                .unwrap();
        let mut receiver = document.subscribe();
        let img = document.elements_by_tag("img").pop().unwrap();

        document.set_attribute(&img, "src", Some("b.png"));
        let batch = receiver.try_recv().unwrap();
        assert!(matches!(&batch[0], MutationRecord::Attribute { name, .. } if name == "src"));

        document.remove_node(&img);
        assert!(!document.is_attached(&img));
        assert!(receiver.try_recv().is_err());
        assert_eq!(document.domain(), "example.com");
    }

    #[test]
    fn test_dropped_receiver_unsubscribes() {
        let document = LiveDocument::parse("<body></body>", "https://example.com/").unwrap();
        drop(document.subscribe());

        let body = document.body().unwrap();
        document.insert_html(&body, "<p>text</p>");
        assert!(document.subscribers.borrow().is_empty());
    }

    #[test]
    fn test_invalid_page_url() {
        assert!(matches!(
            LiveDocument::parse("<p></p>", "not a url"),
            Err(ModerationError::ParseError(_))
        ));
    }
}
