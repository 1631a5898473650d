//! 处理队列
//!
//! 无容量上限的 FIFO，背压由调度速率控制。新发现的图片走优先通道，
//! 取批次时先于普通通道出队。

use std::collections::VecDeque;

use super::candidate::{Candidate, QueueItem};

#[derive(Default)]
pub struct ProcessingQueue {
    priority: VecDeque<QueueItem>,
    general: VecDeque<QueueItem>,
}

impl ProcessingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: Candidate) {
        self.push_item(QueueItem::from(candidate));
    }

    pub fn push_item(&mut self, item: QueueItem) {
        if item.priority {
            self.priority.push_back(item);
        } else {
            self.general.push_back(item);
        }
    }

    /// 从队首取出至多 `max` 项
    pub fn take_batch(&mut self, max: usize) -> Vec<QueueItem> {
        let mut batch = Vec::with_capacity(max.min(self.len()));
        while batch.len() < max {
            match self.priority.pop_front().or_else(|| self.general.pop_front()) {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.priority.len() + self.general.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.general.is_empty()
    }

    pub fn clear(&mut self) {
        self.priority.clear();
        self.general.clear();
    }
}
