//! 分析客户端
//!
//! 对单个候选元素给出结论：先按本地规则跳过不值得分析的内容，
//! 后端可用时请求远程服务，失败则回退到本地启发式分析。
//! 后端不可用时直接走本地分析，省掉一次必然失败的网络往返。

use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;

use crate::moderation::analysis::heuristics::LocalHeuristicAnalyzer;
use crate::moderation::analysis::image::{ImageMetrics, ImageProbe};
use crate::moderation::analysis::service::{AnalysisRequest, AnalysisService};
use crate::moderation::analysis::verdict::AnalysisVerdict;
use crate::moderation::config::constants;
use crate::moderation::core::PipelineContext;
use crate::moderation::error::{helpers, ModerationResult};
use crate::moderation::pipeline::{Candidate, ContentKind};
use crate::parsers::html::text_content;
use crate::utils::{domain_is_within_domain, host_of, resolve_url};

/// 跳过分析的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 文本过短
    TooShort,
    /// 图片在超时前未加载完成
    NotLoaded,
    /// 图片尺寸低于阈值
    TooSmall,
    /// 图片来自可信域名
    TrustedDomain,
    /// 候选元素已被释放
    Released,
}

/// 结论来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    Remote,
    Local,
}

/// 单个候选元素的分析结果
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// 视为隐式放行
    Skipped(SkipReason),
    Verdict {
        verdict: AnalysisVerdict,
        source: VerdictSource,
    },
}

impl AnalysisOutcome {
    pub fn verdict(&self) -> Option<&AnalysisVerdict> {
        match self {
            AnalysisOutcome::Verdict { verdict, .. } => Some(verdict),
            AnalysisOutcome::Skipped(_) => None,
        }
    }
}

/// 分析客户端
pub struct AnalysisClient {
    context: Rc<PipelineContext>,
    service: Rc<dyn AnalysisService>,
    probe: Rc<dyn ImageProbe>,
    heuristics: LocalHeuristicAnalyzer,
}

impl AnalysisClient {
    pub fn new(
        context: Rc<PipelineContext>,
        service: Rc<dyn AnalysisService>,
        probe: Rc<dyn ImageProbe>,
    ) -> Self {
        Self {
            context,
            service,
            probe,
            heuristics: LocalHeuristicAnalyzer::new(),
        }
    }

    pub fn heuristics(&self) -> &LocalHeuristicAnalyzer {
        &self.heuristics
    }

    /// 分析候选元素
    pub async fn analyze(&self, candidate: &Candidate) -> ModerationResult<AnalysisOutcome> {
        let Some(element) = candidate.element() else {
            return Ok(AnalysisOutcome::Skipped(SkipReason::Released));
        };

        match candidate.kind {
            ContentKind::Text => Ok(self.analyze_text(&text_content(&element)).await),
            ContentKind::Image => self.analyze_image(&element).await,
        }
    }

    /// 分析文本
    pub async fn analyze_text(&self, text: &str) -> AnalysisOutcome {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.context.config.min_text_length {
            return AnalysisOutcome::Skipped(SkipReason::TooShort);
        }

        let request = AnalysisRequest::text(trimmed, self.context.page_url());
        self.request_with_fallback(request, |heuristics| heuristics.analyze_text(trimmed))
            .await
    }

    /// 分析图片
    pub async fn analyze_image(&self, image: &Handle) -> ModerationResult<AnalysisOutcome> {
        let Some(metrics) = self.wait_for_image(image).await else {
            tracing::debug!("图片加载超时，跳过");
            return Ok(AnalysisOutcome::Skipped(SkipReason::NotLoaded));
        };

        if metrics.is_below(self.context.config.min_image_dimension) {
            return Ok(AnalysisOutcome::Skipped(SkipReason::TooSmall));
        }

        let image_url = match resolve_url(self.context.document.page_url(), &metrics.src) {
            Some(resolved) => resolved.to_string(),
            None => metrics.src.clone(),
        };

        if self.is_trusted(&image_url) {
            return Ok(AnalysisOutcome::Skipped(SkipReason::TrustedDomain));
        }

        let request = AnalysisRequest::image(image_url.clone(), self.context.page_url());
        Ok(self
            .request_with_fallback(request, |heuristics| {
                heuristics.analyze_image_url(&image_url)
            })
            .await)
    }

    /// 图片地址是否属于可信域名
    pub fn is_trusted(&self, image_url: &str) -> bool {
        let Some(host) = host_of(image_url) else {
            return false;
        };
        self.context
            .config
            .trusted_image_domains
            .iter()
            .any(|domain| domain_is_within_domain(&host, domain))
    }

    /// 等待图片加载完成，超时返回 `None`
    async fn wait_for_image(&self, image: &Handle) -> Option<ImageMetrics> {
        if let Some(metrics) = self.probe.probe(image) {
            return Some(metrics);
        }

        let poll = Duration::from_millis(constants::IMAGE_LOAD_POLL_MS);
        let wait = async {
            loop {
                tokio::time::sleep(poll).await;
                if let Some(metrics) = self.probe.probe(image) {
                    return metrics;
                }
            }
        };

        tokio::time::timeout(self.context.config.image_load_timeout(), wait)
            .await
            .ok()
    }

    /// 远程优先，失败时回退
    async fn request_with_fallback<F>(&self, request: AnalysisRequest, fallback: F) -> AnalysisOutcome
    where
        F: FnOnce(&LocalHeuristicAnalyzer) -> AnalysisVerdict,
    {
        if self.context.backend_available() {
            let remote = match tokio::time::timeout(
                self.context.config.request_timeout(),
                self.service.analyze(&request),
            )
            .await
            {
                Ok(result) => result,
                Err(elapsed) => Err(elapsed.into()),
            };

            match remote {
                Ok(verdict) => {
                    return AnalysisOutcome::Verdict {
                        verdict,
                        source: VerdictSource::Remote,
                    }
                }
                Err(e) => {
                    helpers::log_error(&e);
                    tracing::warn!("远程分析失败，回退到本地分析 ({})", request.endpoint());
                }
            }
        }

        AnalysisOutcome::Verdict {
            verdict: fallback(&self.heuristics),
            source: VerdictSource::Local,
        }
    }
}
