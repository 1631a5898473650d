//! 内容观察器
//!
//! 产生去重后的候选元素流：
//! - 监听文档变更：新插入的图片立即发出，文本变化经防抖合并为一次重扫
//! - 图片 `src` 属性变化时重新分析该图片
//! - 定期全量扫描与更频繁的图片扫描，兜底遗漏的变更通知
//! - 定期重置登记表，容忍合法变化的内容
//!
//! 发出候选之前先在登记表中标记，保证并发触发时也只发出一次。
//! 所有定时任务都由观察器持有，`stop()` 时统一取消。

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::candidate::{Candidate, ContentKind};
use super::registry::ElementState;
use crate::moderation::analysis::ImageProbe;
use crate::moderation::config::constants;
use crate::moderation::core::PipelineContext;
use crate::moderation::document::MutationRecord;
use crate::parsers::html::{
    closest, descendant_elements, get_node_attr, get_node_name, has_class, own_text, SelectorList,
};

/// 候选回调
pub type CandidateCallback = Rc<dyn Fn(Candidate)>;

/// 内容观察器
#[derive(Clone)]
pub struct ContentObserver {
    inner: Rc<ObserverInner>,
}

struct ObserverInner {
    context: Rc<PipelineContext>,
    probe: Rc<dyn ImageProbe>,
    exclusions: SelectorList,
    subscribers: RefCell<Vec<CandidateCallback>>,
    debounce: RefCell<Option<JoinHandle<()>>>,
    tasks: RefCell<Vec<JoinHandle<()>>>,
    running: Cell<bool>,
}

impl ContentObserver {
    pub fn new(context: Rc<PipelineContext>, probe: Rc<dyn ImageProbe>) -> Self {
        let exclusions = SelectorList::parse(&context.config.excluded_selectors);
        Self {
            inner: Rc::new(ObserverInner {
                context,
                probe,
                exclusions,
                subscribers: RefCell::new(Vec::new()),
                debounce: RefCell::new(None),
                tasks: RefCell::new(Vec::new()),
                running: Cell::new(false),
            }),
        }
    }

    /// 订阅候选元素
    pub fn on_candidate_discovered<F>(&self, callback: F)
    where
        F: Fn(Candidate) + 'static,
    {
        self.inner.subscribers.borrow_mut().push(Rc::new(callback));
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// 启动变更监听与所有定时扫描
    pub fn start(&self) {
        if self.inner.running.replace(true) {
            return;
        }

        let config = &self.inner.context.config;
        self.spawn_mutation_listener();
        self.spawn_delayed(config.heading_initial_delay(), |observer| {
            observer.scan_headings();
        });
        self.spawn_delayed(config.text_initial_delay(), |observer| {
            observer.scan_text();
        });
        self.spawn_periodic(config.full_scan_interval(), |observer| {
            observer.full_scan();
        });
        self.spawn_periodic(config.image_scan_interval(), |observer| {
            observer.scan_images();
        });
        self.spawn_periodic(config.registry_reset_interval(), |observer| {
            observer.reset_registry();
        });

        // 图片优先，启动时立即扫描
        let found = self.scan_images();
        tracing::info!("内容观察器已启动，初始发现 {} 张图片", found);
    }

    /// 取消所有定时任务
    pub fn stop(&self) {
        if let Some(handle) = self.inner.debounce.borrow_mut().take() {
            handle.abort();
        }
        for handle in self.inner.tasks.borrow_mut().drain(..) {
            handle.abort();
        }
        if self.inner.running.replace(false) {
            tracing::info!("内容观察器已停止");
        }
    }

    /// 处理一批变更记录
    pub fn handle_mutations(&self, records: &[MutationRecord]) {
        if !self.inner.context.is_enabled() {
            return;
        }

        let mut text_changed = false;
        for record in records {
            match record {
                MutationRecord::ChildList { added, .. } => {
                    for node in added {
                        for element in descendant_elements(node) {
                            if self.is_image_candidate(&element) {
                                self.emit(ContentKind::Image, &element);
                            } else if !text_changed && self.is_text_candidate(&element) {
                                text_changed = true;
                            }
                        }
                    }
                }
                MutationRecord::Attribute { target, name }
                    if name == "src" && get_node_name(target) == Some("img") =>
                {
                    self.handle_source_change(target);
                }
                MutationRecord::Attribute { .. } => {}
            }
        }

        if text_changed {
            self.schedule_text_rescan();
        }
    }

    /// 图片换了地址，需要按新地址重新分析
    fn handle_source_change(&self, image: &Handle) {
        {
            let mut registry = self.inner.context.registry.borrow_mut();
            if registry.state(image) != Some(ElementState::Filtered) {
                registry.remove(image);
            }
        }
        if self.is_image_candidate(image) {
            self.emit(ContentKind::Image, image);
        }
    }

    /// 防抖的文本重扫：窗口内重复触发只保留最后一次
    pub fn schedule_text_rescan(&self) {
        if let Some(previous) = self.inner.debounce.borrow_mut().take() {
            previous.abort();
        }

        let observer = self.clone();
        let delay = self.inner.context.config.debounce();
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            observer.inner.debounce.borrow_mut().take();
            observer.scan_text();
        });
        *self.inner.debounce.borrow_mut() = Some(handle);
    }

    /// 扫描所有图片
    pub fn scan_images(&self) -> usize {
        self.scan(|observer, element| {
            observer.is_image_candidate(element) && observer.emit(ContentKind::Image, element)
        })
    }

    /// 只扫描标题
    pub fn scan_headings(&self) -> usize {
        self.scan(|observer, element| {
            is_heading(element)
                && observer.is_text_candidate(element)
                && observer.emit(ContentKind::Text, element)
        })
    }

    /// 扫描全部文本元素（含标题）
    pub fn scan_text(&self) -> usize {
        self.scan(|observer, element| {
            observer.is_text_candidate(element) && observer.emit(ContentKind::Text, element)
        })
    }

    /// 全量扫描
    pub fn full_scan(&self) -> usize {
        let images = self.scan_images();
        let texts = self.scan_text();
        if images + texts > 0 {
            tracing::info!("全量扫描发现 {} 张图片, {} 段文本", images, texts);
        }
        images + texts
    }

    /// 定期重置登记表，已过滤的元素保留
    pub fn reset_registry(&self) -> usize {
        let cleared = self.inner.context.registry.borrow_mut().reset_expired();
        tracing::debug!("登记表重置，清除 {} 条", cleared);
        cleared
    }

    fn scan<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(&Self, &Handle) -> bool,
    {
        if !self.inner.context.is_enabled() {
            return 0;
        }

        let document = &self.inner.context.document;
        let root = document.body().unwrap_or_else(|| document.document().clone());
        descendant_elements(&root)
            .iter()
            .filter(|element| visit(self, element))
            .count()
    }

    /// 发出候选；元素已登记或已脱离文档时不发出
    fn emit(&self, kind: ContentKind, element: &Handle) -> bool {
        if !self.inner.context.document.is_attached(element) {
            return false;
        }
        if !self.inner.context.registry.borrow_mut().try_mark(element) {
            return false;
        }

        let candidate = Candidate::new(kind, element);
        tracing::debug!("发现候选: {:?}", candidate);

        let subscribers: Vec<CandidateCallback> = self.inner.subscribers.borrow().clone();
        for callback in subscribers {
            callback(candidate.clone());
        }
        true
    }

    /// 已过滤的元素及管道注入的节点都不再处理
    fn is_ignored(&self, element: &Handle) -> bool {
        closest(element, |node| {
            has_class(node, constants::FILTERED_CLASS)
                || get_node_attr(node, constants::INJECTED_ATTR).is_some()
        })
        .is_some()
    }

    fn is_image_candidate(&self, element: &Handle) -> bool {
        if get_node_name(element) != Some("img") || self.is_ignored(element) {
            return false;
        }
        if get_node_attr(element, "src").map_or(true, |src| src.trim().is_empty()) {
            return false;
        }

        // 已知尺寸过小的图片（图标等）永不入队
        match self.inner.probe.probe(element) {
            Some(metrics) => !metrics.is_below(self.inner.context.config.min_image_dimension),
            None => true,
        }
    }

    fn is_text_candidate(&self, element: &Handle) -> bool {
        let Some(name) = get_node_name(element) else {
            return false;
        };
        let heading = constants::HEADING_TAGS.contains(&name);
        if !heading && !constants::TEXT_TAGS.contains(&name) {
            return false;
        }
        if self.is_ignored(element) || own_text(element).trim().is_empty() {
            return false;
        }

        // 标题始终可选，其余元素排除导航、按钮、菜单等界面元素
        heading
            || closest(element, |node| self.inner.exclusions.matches(node)).is_none()
    }

    fn spawn_mutation_listener(&self) {
        let observer = self.clone();
        let mut receiver = self.inner.context.document.subscribe();
        let handle = tokio::task::spawn_local(async move {
            while let Some(batch) = receiver.recv().await {
                observer.handle_mutations(&batch);
            }
        });
        self.inner.tasks.borrow_mut().push(handle);
    }

    fn spawn_delayed<F>(&self, delay: Duration, action: F)
    where
        F: Fn(&ContentObserver) + 'static,
    {
        let observer = self.clone();
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            action(&observer);
        });
        self.inner.tasks.borrow_mut().push(handle);
    }

    fn spawn_periodic<F>(&self, period: Duration, tick: F)
    where
        F: Fn(&ContentObserver) + 'static,
    {
        let observer = self.clone();
        let handle = tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick(&observer);
            }
        });
        self.inner.tasks.borrow_mut().push(handle);
    }
}

fn is_heading(element: &Handle) -> bool {
    get_node_name(element).map_or(false, |name| constants::HEADING_TAGS.contains(&name))
}
