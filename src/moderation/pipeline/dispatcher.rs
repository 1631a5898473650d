//! 批次调度器
//!
//! 限制分析调用的并发与速率：
//! - 单飞：已有批次在处理、队列为空或保护已关闭时，新的调度周期不做任何事
//! - 每个周期从队首取至多 `batch_size` 项，并发分析，等全部结束才算完成
//! - 周期结束后队列仍非空，则在批次间隔后安排下一个周期
//! - 单项失败只记录日志，不影响同批其他项
//!
//! 分析结果返回时会再次检查保护开关，关闭后到达的结果直接丢弃。

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;

use super::candidate::{Candidate, QueueItem};
use super::registry::ElementState;
use crate::moderation::actions::ActionApplier;
use crate::moderation::analysis::{AnalysisClient, AnalysisOutcome};
use crate::moderation::core::PipelineContext;
use crate::moderation::error::{helpers, ErrorCategory};

/// 单个调度周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 保护已关闭
    Disabled,
    /// 已有批次在处理
    AlreadyRunning,
    /// 队列为空
    Idle,
    Completed { processed: usize, remaining: usize },
}

/// 单飞标志守卫；周期被取消时同样复位
struct InFlightGuard<'a>(&'a Cell<bool>);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// 批次调度器
#[derive(Clone)]
pub struct Dispatcher {
    inner: Rc<DispatcherInner>,
}

struct DispatcherInner {
    context: Rc<PipelineContext>,
    client: Rc<AnalysisClient>,
    applier: Rc<ActionApplier>,
    scheduled: RefCell<Option<JoinHandle<()>>>,
    cycles_completed: Cell<u64>,
}

impl Dispatcher {
    pub fn new(
        context: Rc<PipelineContext>,
        client: Rc<AnalysisClient>,
        applier: Rc<ActionApplier>,
    ) -> Self {
        Self {
            inner: Rc::new(DispatcherInner {
                context,
                client,
                applier,
                scheduled: RefCell::new(None),
                cycles_completed: Cell::new(0),
            }),
        }
    }

    /// 入队并在空闲时安排调度
    pub fn enqueue(&self, candidate: Candidate) {
        self.inner.context.queue.borrow_mut().push(candidate);
        self.kick();
    }

    /// 空闲且队列非空时立即安排一个周期
    pub fn kick(&self) {
        let context = &self.inner.context;
        if context.in_flight.get()
            || self.is_scheduled()
            || !context.is_enabled()
            || context.queue.borrow().is_empty()
        {
            return;
        }
        self.schedule_next(Duration::ZERO);
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner
            .scheduled
            .borrow()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    pub fn cycles_completed(&self) -> u64 {
        self.inner.cycles_completed.get()
    }

    /// 取消已安排的周期；正在进行的分析不会被取消
    pub fn stop(&self) {
        if let Some(handle) = self.inner.scheduled.borrow_mut().take() {
            handle.abort();
        }
    }

    /// 执行一个调度周期
    pub async fn run_cycle(&self) -> CycleOutcome {
        let context = &self.inner.context;

        let Some(guard) = InFlightGuard::acquire(&context.in_flight) else {
            return CycleOutcome::AlreadyRunning;
        };
        if !context.is_enabled() {
            return CycleOutcome::Disabled;
        }

        let batch = context
            .queue
            .borrow_mut()
            .take_batch(context.config.batch_size);
        if batch.is_empty() {
            return CycleOutcome::Idle;
        }

        let processed = batch.len();
        tracing::debug!("开始处理批次: {} 项", processed);
        join_all(batch.into_iter().map(|item| self.process_item(item))).await;

        drop(guard);
        self.inner
            .cycles_completed
            .set(self.inner.cycles_completed.get() + 1);

        let remaining = context.queue.borrow().len();
        tracing::info!("批次完成: 处理 {} 项, 剩余 {} 项", processed, remaining);

        if remaining > 0 && context.is_enabled() {
            self.schedule_next(context.config.batch_delay());
        }

        CycleOutcome::Completed {
            processed,
            remaining,
        }
    }

    fn schedule_next(&self, delay: Duration) {
        if self.is_scheduled() {
            return;
        }

        let dispatcher = self.clone();
        let handle = tokio::task::spawn_local(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            dispatcher.inner.scheduled.borrow_mut().take();
            dispatcher.run_cycle().await;
        });
        *self.inner.scheduled.borrow_mut() = Some(handle);
    }

    /// 处理单项；所有错误在这里吞掉
    async fn process_item(&self, item: QueueItem) {
        let context = &self.inner.context;
        let candidate = item.candidate;

        let Some(element) = candidate.element() else {
            tracing::debug!("候选元素已被释放，丢弃");
            return;
        };
        if !context.document.is_attached(&element) {
            tracing::debug!("候选元素已脱离文档，丢弃");
            return;
        }

        context
            .registry
            .borrow_mut()
            .set_state(&element, ElementState::Analyzing);

        let outcome = match self.inner.client.analyze(&candidate).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("分析失败: {}", e);
                context
                    .registry
                    .borrow_mut()
                    .set_state(&element, ElementState::Allowed);
                return;
            }
        };

        let verdict = match outcome {
            AnalysisOutcome::Skipped(reason) => {
                tracing::debug!("跳过分析: {:?}", reason);
                context
                    .registry
                    .borrow_mut()
                    .set_state(&element, ElementState::Allowed);
                return;
            }
            AnalysisOutcome::Verdict { verdict, source } => {
                tracing::debug!("分析结果 ({:?}): {}", source, verdict.action.as_str());
                verdict
            }
        };

        // 等待期间保护可能已被关闭
        if !context.is_enabled() {
            tracing::debug!("保护已关闭，丢弃迟到的分析结果");
            return;
        }

        if !verdict.is_filter() {
            context
                .registry
                .borrow_mut()
                .set_state(&element, ElementState::Allowed);
            return;
        }

        if let Err(e) = self
            .inner
            .applier
            .apply(candidate.kind, &element, &verdict)
        {
            match e.category() {
                ErrorCategory::DomState => tracing::debug!("元素在应用前已移除: {}", e),
                _ => helpers::log_error(&e),
            }
            context
                .registry
                .borrow_mut()
                .set_state(&element, ElementState::Allowed);
        }
    }
}
