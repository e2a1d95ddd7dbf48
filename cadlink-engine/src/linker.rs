use std::collections::{HashMap, HashSet};

use cadlink_core::drawing::{Drawing, Entity, Handle, Polyline};
use cadlink_core::geometry::{point_in_polygon, Bounds2D, Point2};
use cadlink_config::{AppConfig, LabelConfig, LinkerConfig, ScoringMode};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::LinkError;
use crate::labels::PartLabelDetector;
use crate::rect::{self, RectangleCandidate};
use crate::scoring;
use crate::spatial::SpatialIndex;

/// 一条部材链接结果。每个检出的标签恰好产生一条，
/// 即便没有任何成员（此时置信度为 0）。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartLinkResult {
    pub part_name: String,
    pub text_handle: Handle,
    pub center: Option<Point2>,
    pub linked_handles: Vec<Handle>,
    pub confidence: f64,
}

/// 部材链接引擎。
///
/// 构造后只持有配置与编译好的模式，不含任何跨调用状态；
/// 空间索引、矩形表、归属表全部在单次 `link_entities` 内部构建并丢弃。
/// 对同一图纸重复调用是幂等且确定的。
#[derive(Debug)]
pub struct EntityLinker {
    config: LinkerConfig,
    detector: PartLabelDetector,
}

impl EntityLinker {
    pub fn new(config: LinkerConfig, labels: &LabelConfig) -> Result<Self, LinkError> {
        Ok(Self {
            detector: PartLabelDetector::new(labels)?,
            config,
        })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, LinkError> {
        Self::new(config.linker.clone(), &config.labels)
    }

    /// 对整张图纸执行一次部材链接，图层自动探测。
    pub fn link_entities(&self, drawing: &Drawing) -> Vec<PartLinkResult> {
        self.link_entities_on_layer(drawing, None)
    }

    /// 部材链接（层 + 矩形匹配）。
    ///
    /// 流程：
    /// 1. 计算全图范围（自适应回退半径的种子）；
    /// 2. 对几何实体建空间索引；
    /// 3. 确定目标图层，收集标签、矩形边界与闭合折线；
    /// 4. 按标签发现顺序依次套用策略：矩形包含 → 最近矩形 →
    ///    折线包含 → 最近折线 → 半径回退，先成者胜，
    ///    每个矩形/折线至多服务一个标签；
    /// 5. 汇总成员与分值，给出每个部材的置信度。
    pub fn link_entities_on_layer(
        &self,
        drawing: &Drawing,
        layer_override: Option<&str>,
    ) -> Vec<PartLinkResult> {
        let drawing_bounds = drawing.bounds();
        let index = self.build_index(drawing);

        let detected_layer;
        let target_layer = match layer_override {
            Some(layer) => Some(layer),
            None => {
                detected_layer = self.detector.detect_layer(drawing);
                detected_layer.as_deref()
            }
        };
        info!(layer = ?target_layer, indexed = index.len(), "开始层+矩形匹配");

        let labels = self.detector.find_labels(drawing, target_layer);
        debug!(count = labels.len(), "检出部材名标签");

        let rectangles = rect::detect_rectangles(drawing, target_layer, &self.config);

        let closed_polylines: Vec<(&Handle, &Polyline)> = drawing
            .entities()
            .filter_map(|(handle, entity)| match entity {
                Entity::Polyline(polyline) if polyline.is_closed => Some((handle, polyline)),
                _ => None,
            })
            .collect();
        debug!(count = closed_polylines.len(), "收集到闭合折线（回退边界）");

        // 单次调用的工作状态，调用结束即丢弃。
        let mut assignment: HashMap<Handle, (Handle, f64)> = HashMap::new();
        let mut used_rectangles: HashSet<usize> = HashSet::new();
        let mut used_polylines: HashSet<Handle> = HashSet::new();

        for label in &labels {
            let Some(center) = label.center else {
                continue;
            };

            if let Some(rect_idx) =
                self.choose_rectangle(&rectangles, &used_rectangles, center)
            {
                used_rectangles.insert(rect_idx);
                let matched = self.collect_in_bounds(
                    drawing,
                    &rectangles[rect_idx].bounds,
                    None,
                    &label.handle,
                    target_layer,
                    &mut assignment,
                );
                debug!(part = %label.name, matched, "矩形边界匹配");
                continue;
            }

            if let Some((boundary_handle, polyline)) =
                self.choose_polyline(&closed_polylines, &used_polylines, center)
            {
                used_polylines.insert(boundary_handle.clone());
                let matched = self.collect_in_polyline(
                    drawing,
                    boundary_handle,
                    polyline,
                    &label.handle,
                    target_layer,
                    &mut assignment,
                );
                debug!(part = %label.name, matched, "闭合折线边界匹配");
            } else {
                let matched = self.fallback_proximity_match(
                    drawing,
                    &index,
                    drawing_bounds.as_ref(),
                    center,
                    &label.handle,
                    &mut assignment,
                );
                debug!(part = %label.name, matched, "距离回退匹配");
            }
        }

        info!(total_matched = assignment.len(), "实体归属完成");

        // 成员按图纸实体顺序汇总，保证输出确定。
        let mut members: HashMap<&Handle, (Vec<Handle>, Vec<f64>)> = HashMap::new();
        for (handle, _) in drawing.entities() {
            if let Some((text_handle, score)) = assignment.get(handle) {
                let entry = members.entry(text_handle).or_default();
                entry.0.push(handle.clone());
                entry.1.push(*score);
            }
        }

        labels
            .iter()
            .map(|label| {
                let (linked_handles, scores) = members
                    .remove(&label.handle)
                    .unwrap_or_default();
                PartLinkResult {
                    part_name: label.name.clone(),
                    text_handle: label.handle.clone(),
                    center: label.center,
                    confidence: scoring::confidence(
                        linked_handles.len(),
                        &scores,
                        self.config.max_trusted_members,
                    ),
                    linked_handles,
                }
            })
            .collect()
    }

    /// 对 LINE/CIRCLE/ARC/POLYLINE/INSERT 建索引；文字实体不参与。
    fn build_index(&self, drawing: &Drawing) -> SpatialIndex {
        let mut index = SpatialIndex::new(self.config.cell_size);
        for (handle, entity) in drawing.entities() {
            if entity.is_text() {
                continue;
            }
            if let Some(bounds) = entity.bounds() {
                index.insert(handle.clone(), bounds);
            }
        }
        index
    }

    /// 策略 1/2：先找包含标签中心的未用矩形，再退到阈值内最近的。
    fn choose_rectangle(
        &self,
        rectangles: &[RectangleCandidate],
        used: &HashSet<usize>,
        center: Point2,
    ) -> Option<usize> {
        for (idx, rect) in rectangles.iter().enumerate() {
            if used.contains(&idx) {
                continue;
            }
            if rect.bounds.contains_point(center) {
                return Some(idx);
            }
        }

        let mut best = None;
        let mut min_distance = f64::INFINITY;
        for (idx, rect) in rectangles.iter().enumerate() {
            if used.contains(&idx) {
                continue;
            }
            let distance = center.distance_to(rect.center);
            if distance < min_distance && distance < self.config.near_rectangle_distance {
                min_distance = distance;
                best = Some(idx);
            }
        }
        best
    }

    /// 策略 3/4：闭合折线的包含优先，其次阈值内最近。
    fn choose_polyline<'a>(
        &self,
        polylines: &[(&'a Handle, &'a Polyline)],
        used: &HashSet<Handle>,
        center: Point2,
    ) -> Option<(&'a Handle, &'a Polyline)> {
        let mut best = None;
        let mut min_distance = f64::INFINITY;
        for (handle, polyline) in polylines {
            if used.contains(*handle) {
                continue;
            }
            if point_in_polygon(center, &polyline.vertices) {
                return Some((*handle, *polyline));
            }
            let Some(polyline_center) = polyline_center(polyline) else {
                continue;
            };
            let distance = center.distance_to(polyline_center);
            if distance < min_distance && distance < self.config.near_polyline_distance {
                min_distance = distance;
                best = Some((*handle, *polyline));
            }
        }
        best
    }

    /// 收集边界内的成员并归属给标签。
    ///
    /// 排除标签自身、已有归属的实体、一切文字实体（只有标签本身的
    /// 文字算部材名），以及目标图层之外的实体。`exclude` 用于折线
    /// 边界自身。命中者一律记边界分值。
    fn collect_in_bounds(
        &self,
        drawing: &Drawing,
        bounds: &Bounds2D,
        exclude: Option<&Handle>,
        text_handle: &Handle,
        target_layer: Option<&str>,
        assignment: &mut HashMap<Handle, (Handle, f64)>,
    ) -> usize {
        let mut matched = 0;
        for (handle, entity) in drawing.entities() {
            if handle == text_handle || Some(handle) == exclude {
                continue;
            }
            if assignment.contains_key(handle) {
                continue;
            }
            if let Some(layer) = target_layer {
                if entity.layer_name() != layer {
                    continue;
                }
            }
            if entity.is_text() {
                continue;
            }
            let Some(center) = entity.center() else {
                continue;
            };
            if bounds.contains_point(center) {
                assignment.insert(
                    handle.clone(),
                    (text_handle.clone(), self.config.boundary_score),
                );
                matched += 1;
            }
        }
        matched
    }

    /// 折线边界的成员收集：先做包围盒粗筛，再用射线法精判。
    fn collect_in_polyline(
        &self,
        drawing: &Drawing,
        boundary_handle: &Handle,
        boundary: &Polyline,
        text_handle: &Handle,
        target_layer: Option<&str>,
        assignment: &mut HashMap<Handle, (Handle, f64)>,
    ) -> usize {
        let Some(bounds) = polyline_bounds(boundary) else {
            return 0;
        };
        let mut matched = 0;
        for (handle, entity) in drawing.entities() {
            if handle == text_handle || handle == boundary_handle {
                continue;
            }
            if assignment.contains_key(handle) {
                continue;
            }
            if let Some(layer) = target_layer {
                if entity.layer_name() != layer {
                    continue;
                }
            }
            if entity.is_text() {
                continue;
            }
            let Some(center) = entity.center() else {
                continue;
            };
            if bounds.contains_point(center) && point_in_polygon(center, &boundary.vertices) {
                assignment.insert(
                    handle.clone(),
                    (text_handle.clone(), self.config.boundary_score),
                );
                matched += 1;
            }
        }
        matched
    }

    /// 策略 5：空间索引半径粗筛后按精确距离过滤。
    ///
    /// 分值从距离 0 处的 0.7 线性衰减到半径处的 0.5。已被其他标签
    /// 以更低分值占有的实体可以改判给分值更高（即更近）的标签，
    /// 这保证回退阶段的归属落在最近的标签上；边界包含（0.95）
    /// 的归属永远不会被回退撼动。
    fn fallback_proximity_match(
        &self,
        drawing: &Drawing,
        index: &SpatialIndex,
        drawing_bounds: Option<&Bounds2D>,
        text_center: Point2,
        text_handle: &Handle,
        assignment: &mut HashMap<Handle, (Handle, f64)>,
    ) -> usize {
        let radius = match self.config.scoring {
            ScoringMode::Linear => self.config.fallback_radius,
            ScoringMode::Directional => scoring::adaptive_search_radius(drawing_bounds),
        };

        let mut matched = 0;
        for handle in index.query_radius(text_center, radius) {
            if &handle == text_handle {
                continue;
            }
            let Some(entity) = drawing.entity(&handle) else {
                continue;
            };
            let Some(entity_center) = entity.center() else {
                continue;
            };
            let distance = text_center.distance_to(entity_center);
            if distance > radius {
                continue;
            }

            let score = match self.config.scoring {
                ScoringMode::Linear => scoring::linear_proximity_score(distance, radius),
                ScoringMode::Directional => scoring::directional_match_score(
                    text_center,
                    entity_center,
                    distance,
                    radius,
                ),
            };

            if let Some((_, existing)) = assignment.get(&handle) {
                if *existing >= score || *existing >= self.config.boundary_score {
                    continue;
                }
            }
            assignment.insert(handle.clone(), (text_handle.clone(), score));
            matched += 1;
        }
        matched
    }
}

fn polyline_bounds(polyline: &Polyline) -> Option<Bounds2D> {
    let mut bounds = Bounds2D::empty();
    for vertex in &polyline.vertices {
        bounds.include_point(*vertex);
    }
    if bounds.is_empty() { None } else { Some(bounds) }
}

fn polyline_center(polyline: &Polyline) -> Option<Point2> {
    polyline_bounds(polyline).map(|bounds| bounds.center())
}
