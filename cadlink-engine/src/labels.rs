use cadlink_core::drawing::{Drawing, Handle};
use cadlink_core::geometry::Point2;
use cadlink_config::LabelConfig;
use regex::Regex;
use tracing::debug;

use crate::errors::LinkError;

/// 一个检出的部材名标签：内容命中命名模式的 TEXT/MTEXT 实体。
#[derive(Debug, Clone)]
pub struct PartLabel {
    pub handle: Handle,
    pub name: String,
    pub center: Option<Point2>,
}

/// 部材名检测器。模式在构造时编译一次，之后只读。
#[derive(Debug)]
pub struct PartLabelDetector {
    patterns: Vec<Regex>,
    preferred_layers: Vec<String>,
}

impl PartLabelDetector {
    /// 由配置构造。任何一条模式非法都立即报错，而不是悄悄跳过。
    pub fn new(config: &LabelConfig) -> Result<Self, LinkError> {
        let mut patterns = Vec::with_capacity(config.patterns.len());
        for pattern in &config.patterns {
            let compiled =
                Regex::new(pattern).map_err(|source| LinkError::InvalidLabelPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
            patterns.push(compiled);
        }
        Ok(Self {
            patterns,
            preferred_layers: config.preferred_layers.clone(),
        })
    }

    /// 文本是否命中任一部材名模式（子串匹配，不锚定）。
    pub fn is_part_name(&self, text: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(text))
    }

    /// 自动探测部材图层：按优先顺序找第一个已声明
    /// 且至少放了一个实体的图层名；全部落空则对全图层操作。
    pub fn detect_layer(&self, drawing: &Drawing) -> Option<String> {
        for preferred in &self.preferred_layers {
            if !drawing.has_layer(preferred) {
                continue;
            }
            let count = drawing.entity_count_on_layer(preferred);
            if count > 0 {
                debug!(layer = %preferred, entities = count, "探测到部材图层");
                return Some(preferred.clone());
            }
        }
        None
    }

    /// 收集部材名标签候选，顺序即实体加入顺序。
    pub fn find_labels(&self, drawing: &Drawing, target_layer: Option<&str>) -> Vec<PartLabel> {
        let mut labels = Vec::new();
        for (handle, entity) in drawing.entities() {
            let Some(content) = entity.text_content() else {
                continue;
            };
            if let Some(layer) = target_layer {
                if entity.layer_name() != layer {
                    continue;
                }
            }
            if self.is_part_name(content) {
                labels.push(PartLabel {
                    handle: handle.clone(),
                    name: content.to_string(),
                    center: entity.center(),
                });
            }
        }
        labels
    }
}
