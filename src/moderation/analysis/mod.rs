//! 分析模块
//!
//! 远程优先、本地回退的内容分类

pub mod client;
pub mod heuristics;
pub mod image;
pub mod service;
pub mod verdict;

// 重新导出主要类型
pub use client::{AnalysisClient, AnalysisOutcome, SkipReason, VerdictSource};
pub use heuristics::LocalHeuristicAnalyzer;
pub use image::{AttributeImageProbe, ImageMetrics, ImageProbe};
pub use service::{AnalysisRequest, AnalysisService, HttpAnalysisService};
pub use verdict::{Action, AnalysisVerdict};
