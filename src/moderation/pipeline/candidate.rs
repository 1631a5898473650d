//! 候选元素与队列项

use std::fmt;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::parsers::html::get_node_name;

/// 内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 元素身份：节点地址。只有配合弱引用校验时才有意义
pub type ElementKey = usize;

pub fn element_key(node: &Handle) -> ElementKey {
    Rc::as_ptr(node) as ElementKey
}

/// 待分析的候选元素
///
/// 只持有弱引用，节点的所有权始终属于文档。
#[derive(Clone)]
pub struct Candidate {
    pub kind: ContentKind,
    element: Weak<Node>,
    pub discovered_at: Instant,
}

impl Candidate {
    pub fn new(kind: ContentKind, element: &Handle) -> Self {
        Self {
            kind,
            element: Rc::downgrade(element),
            discovered_at: Instant::now(),
        }
    }

    /// 取回节点；节点已被释放时返回 `None`
    pub fn element(&self) -> Option<Handle> {
        self.element.upgrade()
    }

    pub fn is_image(&self) -> bool {
        self.kind == ContentKind::Image
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self
            .element()
            .and_then(|node| get_node_name(&node).map(str::to_string));
        f.debug_struct("Candidate")
            .field("kind", &self.kind)
            .field("element", &tag)
            .finish()
    }
}

/// 队列项
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub candidate: Candidate,
    /// 优先通道（新发现的图片）
    pub priority: bool,
}

impl From<Candidate> for QueueItem {
    fn from(candidate: Candidate) -> Self {
        let priority = candidate.is_image();
        Self {
            candidate,
            priority,
        }
    }
}
