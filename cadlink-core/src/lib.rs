pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，与图纸的双精度坐标保持一致。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        /// 到另一点的欧氏距离。
        #[inline]
        pub fn distance_to(self, other: Point2) -> f64 {
            (other.0 - self.0).length()
        }

        /// 两点的中点，常用于 LINE 实体的代表点。
        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 轴对齐边界框。退化（零面积）的框是合法的，点状实体会产生这种框。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 判定点是否落在框内，四条边均按闭区间处理。
        #[inline]
        pub fn contains_point(&self, point: Point2) -> bool {
            self.min.x() <= point.x()
                && point.x() <= self.max.x()
                && self.min.y() <= point.y()
                && point.y() <= self.max.y()
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }
    }

    /// 射线法（even-odd）判定点是否在多边形内部。
    ///
    /// 顶点数少于 3 时直接返回 `false`，自交多边形按 even-odd 规则原样处理。
    /// 点恰好落在边或顶点上时结果取决于公式本身，这一边界歧义与原始
    /// 图纸处理流程保持一致，不做额外修正。
    pub fn point_in_polygon(point: Point2, vertices: &[Point2]) -> bool {
        if vertices.len() < 3 {
            return false;
        }
        let x = point.x();
        let y = point.y();
        let mut inside = false;
        let mut j = vertices.len() - 1;
        for i in 0..vertices.len() {
            let (xi, yi) = (vertices[i].x(), vertices[i].y());
            let (xj, yj) = (vertices[j].x(), vertices[j].y());
            if ((yi > y) != (yj > y)) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn bounds_grow_by_points() {
            let mut bounds = Bounds2D::empty();
            assert!(bounds.is_empty());
            bounds.include_point(Point2::new(10.0, -5.0));
            bounds.include_point(Point2::new(-2.0, 7.0));
            assert_eq!(bounds.min().x(), -2.0);
            assert_eq!(bounds.min().y(), -5.0);
            assert_eq!(bounds.max().x(), 10.0);
            assert_eq!(bounds.max().y(), 7.0);
            assert!(bounds.contains_point(Point2::new(0.0, 0.0)));
            assert!(bounds.contains_point(Point2::new(10.0, 7.0)));
            assert!(!bounds.contains_point(Point2::new(10.1, 0.0)));
        }

        #[test]
        fn polygon_test_handles_square() {
            let square = [
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 100.0),
                Point2::new(0.0, 100.0),
            ];
            assert!(point_in_polygon(Point2::new(50.0, 50.0), &square));
            assert!(!point_in_polygon(Point2::new(150.0, 50.0), &square));
            assert!(!point_in_polygon(Point2::new(-1.0, 50.0), &square));
        }

        #[test]
        fn polygon_test_rejects_degenerate_input() {
            assert!(!point_in_polygon(Point2::new(0.0, 0.0), &[]));
            let segment = [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)];
            assert!(!point_in_polygon(Point2::new(5.0, 0.0), &segment));
        }

        #[test]
        fn polygon_test_concave_shape() {
            // L 形：凹口处的点应判定为外部。
            let shape = [
                Point2::new(0.0, 0.0),
                Point2::new(40.0, 0.0),
                Point2::new(40.0, 40.0),
                Point2::new(20.0, 40.0),
                Point2::new(20.0, 20.0),
                Point2::new(0.0, 20.0),
            ];
            assert!(point_in_polygon(Point2::new(10.0, 10.0), &shape));
            assert!(point_in_polygon(Point2::new(30.0, 30.0), &shape));
            assert!(!point_in_polygon(Point2::new(10.0, 30.0), &shape));
        }
    }
}

pub mod drawing {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2};

    /// 实体句柄：图纸内唯一且稳定的字符串标识，沿用 DXF 的十六进制风格。
    pub type Handle = String;

    /// INSERT（块参照）没有展开后的几何，范围用插入点向四周外扩该常量近似。
    pub const INSERT_BBOX_MARGIN: f64 = 50.0;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
            }
        }
    }

    /// 链接引擎消费的封闭实体集合。引擎只读取几何，从不修改。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
        Text(Text),
        MText(MText),
        BlockReference(BlockReference),
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    impl Line {
        /// 线段长度，矩形检测以此过滤短线。
        #[inline]
        pub fn length(&self) -> f64 {
            self.start.distance_to(self.end)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    /// 圆弧实体，角度为弧度。范围计算采用外接正方形近似。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<Point2>,
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub layer: String,
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Text(text) => &text.layer,
                Entity::MText(mtext) => &mtext.layer,
                Entity::BlockReference(reference) => &reference.layer,
            }
        }

        /// TEXT/MTEXT 返回 true。成员收集阶段会排除所有文字实体。
        #[inline]
        pub fn is_text(&self) -> bool {
            matches!(self, Entity::Text(_) | Entity::MText(_))
        }

        /// 文字内容。非文字实体返回 `None`。
        pub fn text_content(&self) -> Option<&str> {
            match self {
                Entity::Text(text) => Some(&text.content),
                Entity::MText(mtext) => Some(&mtext.content),
                _ => None,
            }
        }

        /// 计算实体的 2D 轴对齐范围。
        ///
        /// 文字实体不参与空间索引（标签按点包含匹配），返回 `None`；
        /// 空的折线同样返回 `None`，调用方按"跳过"处理。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Entity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Entity::Circle(Circle { center, radius, .. })
                | Entity::Arc(Arc { center, radius, .. }) => {
                    let radius = radius.abs();
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Entity::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(*vertex);
                    }
                }
                Entity::BlockReference(reference) => {
                    let insert = reference.insert;
                    bounds.include_point(Point2::new(
                        insert.x() - INSERT_BBOX_MARGIN,
                        insert.y() - INSERT_BBOX_MARGIN,
                    ));
                    bounds.include_point(Point2::new(
                        insert.x() + INSERT_BBOX_MARGIN,
                        insert.y() + INSERT_BBOX_MARGIN,
                    ));
                }
                Entity::Text(_) | Entity::MText(_) => return None,
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        /// 实体的代表中心点，距离匹配与包含判定都以此为准。
        ///
        /// 几何字段缺失（空折线）时返回 `None`，调用方不得将其纳入匹配。
        pub fn center(&self) -> Option<Point2> {
            match self {
                Entity::Text(text) => Some(text.insert),
                Entity::MText(mtext) => Some(mtext.insert),
                Entity::BlockReference(reference) => Some(reference.insert),
                Entity::Line(line) => Some(line.start.midpoint(line.end)),
                Entity::Circle(circle) => Some(circle.center),
                Entity::Arc(arc) => Some(arc.center),
                Entity::Polyline(_) => self.bounds().map(|bounds| bounds.center()),
            }
        }
    }

    /// 图纸容器：图层表加按加入顺序保存的实体列表。
    ///
    /// 句柄由容器分配（大写十六进制递增），加入后不再变动，
    /// 链接结果全部以句柄指涉实体。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Drawing {
        layers: HashMap<String, Layer>,
        entities: Vec<(Handle, Entity)>,
        next_handle: u64,
    }

    impl Drawing {
        pub fn new() -> Self {
            let mut drawing = Self::default();
            drawing.ensure_layer("0");
            drawing
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        fn next_handle(&mut self) -> Handle {
            self.next_handle += 1;
            format!("{:X}", self.next_handle)
        }

        pub fn add_entity(&mut self, entity: Entity) -> Handle {
            self.ensure_layer(entity.layer_name().to_string());
            let handle = self.next_handle();
            self.entities.push((handle.clone(), entity));
            handle
        }

        pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) -> Handle {
            self.add_entity(Entity::Line(Line {
                start,
                end,
                layer: layer.into(),
            }))
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(Entity::Circle(Circle {
                center,
                radius,
                layer: layer.into(),
            }))
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                layer: layer.into(),
            }))
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> Handle
        where
            I: IntoIterator<Item = Point2>,
        {
            self.add_entity(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer: layer.into(),
            }))
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(Entity::Text(Text {
                insert,
                content: content.into(),
                height,
                layer: layer.into(),
            }))
        }

        pub fn add_mtext(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(Entity::MText(MText {
                insert,
                content: content.into(),
                height,
                layer: layer.into(),
            }))
        }

        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            layer: impl Into<String>,
        ) -> Handle {
            self.add_entity(Entity::BlockReference(BlockReference {
                name: name.into(),
                insert,
                layer: layer.into(),
            }))
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn has_layer(&self, name: &str) -> bool {
            self.layers.contains_key(name)
        }

        /// 指定图层上的实体数量，图层自动探测用。
        pub fn entity_count_on_layer(&self, name: &str) -> usize {
            self.entities
                .iter()
                .filter(|(_, entity)| entity.layer_name() == name)
                .count()
        }

        /// 按加入顺序迭代实体。链接算法的确定性依赖这一顺序。
        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(Handle, Entity)> {
            self.entities.iter()
        }

        pub fn entity(&self, handle: &str) -> Option<&Entity> {
            self.entities
                .iter()
                .find(|(candidate, _)| candidate == handle)
                .map(|(_, entity)| entity)
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entities.is_empty()
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.entities.len()
        }

        /// 全图纸范围：对所有有几何范围的实体求并。文字实体不计入。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn handles_are_unique_and_stable() {
            let mut drawing = Drawing::new();
            let a = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            let b = drawing.add_circle(Point2::new(5.0, 5.0), 2.0, "GEOM");
            assert_ne!(a, b);
            assert!(matches!(drawing.entity(&a), Some(Entity::Line(_))));
            assert!(matches!(drawing.entity(&b), Some(Entity::Circle(_))));
            assert!(drawing.entity("ZZ").is_none());
        }

        #[test]
        fn layers_are_created_on_demand() {
            let mut drawing = Drawing::new();
            drawing.add_text(Point2::new(0.0, 0.0), "DF-01", 3.5, "板情報");
            assert!(drawing.has_layer("板情報"));
            assert_eq!(drawing.entity_count_on_layer("板情報"), 1);
            assert_eq!(drawing.entity_count_on_layer("0"), 0);
        }

        #[test]
        fn text_entities_have_no_bounds() {
            let text = Entity::Text(Text {
                insert: Point2::new(1.0, 2.0),
                content: "DF-01".to_string(),
                height: 3.5,
                layer: "0".to_string(),
            });
            assert!(text.bounds().is_none());
            let center = text.center().expect("text has an insertion point");
            assert_eq!(center.x(), 1.0);
            assert_eq!(center.y(), 2.0);
        }

        #[test]
        fn arc_bounds_use_circumscribing_square() {
            let arc = Entity::Arc(Arc {
                center: Point2::new(10.0, 10.0),
                radius: 5.0,
                start_angle: 0.0,
                end_angle: 1.0,
                layer: "0".to_string(),
            });
            let bounds = arc.bounds().expect("arc has bounds");
            assert_eq!(bounds.min().x(), 5.0);
            assert_eq!(bounds.min().y(), 5.0);
            assert_eq!(bounds.max().x(), 15.0);
            assert_eq!(bounds.max().y(), 15.0);
        }

        #[test]
        fn block_reference_bounds_are_inflated_insert_point() {
            let reference = Entity::BlockReference(BlockReference {
                name: "BOLT".to_string(),
                insert: Point2::new(100.0, 200.0),
                layer: "0".to_string(),
            });
            let bounds = reference.bounds().expect("insert has approximate bounds");
            assert_eq!(bounds.min().x(), 100.0 - INSERT_BBOX_MARGIN);
            assert_eq!(bounds.max().y(), 200.0 + INSERT_BBOX_MARGIN);
        }

        #[test]
        fn empty_polyline_is_skipped_not_an_error() {
            let polyline = Entity::Polyline(Polyline {
                vertices: Vec::new(),
                is_closed: true,
                layer: "0".to_string(),
            });
            assert!(polyline.bounds().is_none());
            assert!(polyline.center().is_none());
        }

        #[test]
        fn drawing_bounds_union_ignores_text() {
            let mut drawing = Drawing::new();
            drawing.add_line(Point2::new(0.0, 0.0), Point2::new(100.0, 50.0), "0");
            drawing.add_text(Point2::new(9_999.0, 9_999.0), "DF-01", 3.5, "0");
            let bounds = drawing.bounds().expect("line contributes bounds");
            assert_eq!(bounds.max().x(), 100.0);
            assert_eq!(bounds.max().y(), 50.0);
        }
    }
}
