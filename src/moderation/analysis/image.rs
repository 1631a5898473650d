//! 图片探测
//!
//! 静态文档里没有真实的图片加载过程，尺寸与加载状态通过 [`ImageProbe`] 读取。
//! 默认实现从属性中获取：`data-natural-width`/`data-natural-height` 优先，
//! 其次 `width`/`height` 与内联样式。`data-loaded="false"` 表示尚未加载完成。

use markup5ever_rcdom::Handle;

use crate::parsers::html::{get_node_attr, layout_box};

/// 图片度量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetrics {
    pub src: String,
    /// 未声明尺寸时为 `None`
    pub natural_width: Option<u32>,
    pub natural_height: Option<u32>,
}

impl ImageMetrics {
    /// 已知尺寸且任一边低于阈值
    pub fn is_below(&self, min_dimension: u32) -> bool {
        match (self.natural_width, self.natural_height) {
            (Some(width), Some(height)) => width < min_dimension || height < min_dimension,
            (Some(side), None) | (None, Some(side)) => side < min_dimension,
            (None, None) => false,
        }
    }
}

/// 图片探测接口
pub trait ImageProbe {
    /// 返回 `None` 表示图片尚未加载完成
    fn probe(&self, image: &Handle) -> Option<ImageMetrics>;
}

/// 基于属性的默认探测器
#[derive(Debug, Default, Clone, Copy)]
pub struct AttributeImageProbe;

impl AttributeImageProbe {
    fn read_dimension(image: &Handle, natural: &str) -> Option<u32> {
        get_node_attr(image, natural).and_then(|value| value.trim().parse().ok())
    }
}

impl ImageProbe for AttributeImageProbe {
    fn probe(&self, image: &Handle) -> Option<ImageMetrics> {
        let src = get_node_attr(image, "src")?.trim().to_string();
        if src.is_empty() {
            return None;
        }
        if get_node_attr(image, "data-loaded").as_deref() == Some("false") {
            return None;
        }

        let declared = layout_box(image);
        Some(ImageMetrics {
            natural_width: Self::read_dimension(image, "data-natural-width")
                .or(declared.map(|layout| layout.width)),
            natural_height: Self::read_dimension(image, "data-natural-height")
                .or(declared.map(|layout| layout.height)),
            src,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::create_element;

    #[test]
    fn test_natural_size_wins() {
        let img = create_element(
            "img",
            &[
                ("src", "a.png"),
                ("width", "300"),
                ("height", "300"),
                ("data-natural-width", "40"),
                ("data-natural-height", "400"),
            ],
        );
        let metrics = AttributeImageProbe.probe(&img).unwrap();
        assert_eq!(metrics.natural_width, Some(40));
        assert!(metrics.is_below(50));
    }

    #[test]
    fn test_not_loaded() {
        let lazy = create_element("img", &[("src", "a.png"), ("data-loaded", "false")]);
        assert!(AttributeImageProbe.probe(&lazy).is_none());

        let empty = create_element("img", &[("src", "  ")]);
        assert!(AttributeImageProbe.probe(&empty).is_none());
    }

    #[test]
    fn test_unknown_size_is_not_small() {
        let img = create_element("img", &[("src", "photo.jpg")]);
        let metrics = AttributeImageProbe.probe(&img).unwrap();
        assert_eq!(metrics.natural_width, None);
        assert!(!metrics.is_below(50));
    }
}
