//! 处理管道模块
//!
//! 观察器发现候选 → 登记表去重 → 队列缓冲 → 调度器分批分析并应用结果

pub mod candidate;
pub mod dispatcher;
pub mod observer;
pub mod queue;
pub mod registry;

// 重新导出主要类型
pub use candidate::{element_key, Candidate, ContentKind, ElementKey, QueueItem};
pub use dispatcher::{CycleOutcome, Dispatcher};
pub use observer::{CandidateCallback, ContentObserver};
pub use queue::ProcessingQueue;
pub use registry::{ElementRegistry, ElementState};
