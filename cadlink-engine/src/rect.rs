use std::collections::{BTreeMap, HashSet};

use cadlink_core::drawing::{Drawing, Entity, Handle};
use cadlink_core::geometry::{Bounds2D, Point2};
use cadlink_config::LinkerConfig;
use tracing::debug;

/// 一个由四条独立 LINE 还原出的轴对齐矩形边界。
///
/// 派生数据，每次检测重新构建，不跨调用共享身份。
#[derive(Debug, Clone)]
pub struct RectangleCandidate {
    pub bounds: Bounds2D,
    pub center: Point2,
    pub width: f64,
    pub height: f64,
    /// 构成矩形的四条线：上、下、左、右。
    pub lines: [Handle; 4],
}

#[derive(Debug)]
struct HorizontalLine {
    handle: Handle,
    y: f64,
    x_min: f64,
    x_max: f64,
}

#[derive(Debug)]
struct VerticalLine {
    handle: Handle,
    x: f64,
    y_min: f64,
    y_max: f64,
}

/// 从独立 LINE 实体还原矩形部材边界。
///
/// 图纸里的部材外框常用四条互不相连的线段画成而非闭合折线，
/// 此处按"长水平线 + 长垂直线 + 容差分组"的方式把它们拼回矩形：
///
/// 1. 过滤目标图层上长度达标的 LINE，按水平/垂直分类（斜线不支持）；
/// 2. 以量化坐标分组，吸收测量抖动；
/// 3. 对每对上下水平组求 X 重叠区间，重叠过窄的组合排除；
/// 4. 为区间左右两端寻找贯穿整个高度的垂直线，两侧齐备才算矩形；
/// 5. 以四条线句柄的无序集合去重，对称的配对顺序不会产生重复矩形。
///
/// 复杂度受水平组数与垂直线数之积约束；边界候选线只是全部实体的
/// 一小部分，代价可接受。
pub fn detect_rectangles(
    drawing: &Drawing,
    target_layer: Option<&str>,
    config: &LinkerConfig,
) -> Vec<RectangleCandidate> {
    let tolerance = config.endpoint_tolerance;
    let min_length = config.min_boundary_line_length;

    let mut h_lines: Vec<HorizontalLine> = Vec::new();
    let mut v_lines: Vec<VerticalLine> = Vec::new();

    for (handle, entity) in drawing.entities() {
        let Entity::Line(line) = entity else {
            continue;
        };
        if let Some(layer) = target_layer {
            if line.layer != layer {
                continue;
            }
        }
        if line.length() < min_length {
            continue;
        }

        let (sx, sy) = (line.start.x(), line.start.y());
        let (ex, ey) = (line.end.x(), line.end.y());
        // 分类为严格小于容差；恰好等于容差的偏差不算水平/垂直线。
        if (ey - sy).abs() < tolerance {
            h_lines.push(HorizontalLine {
                handle: handle.clone(),
                y: (sy + ey) / 2.0,
                x_min: sx.min(ex),
                x_max: sx.max(ex),
            });
        } else if (ex - sx).abs() < tolerance {
            v_lines.push(VerticalLine {
                handle: handle.clone(),
                x: (sx + ex) / 2.0,
                y_min: sy.min(ey),
                y_max: sy.max(ey),
            });
        }
    }

    debug!(
        horizontal = h_lines.len(),
        vertical = v_lines.len(),
        "矩形检测：边界候选线统计"
    );

    // 水平线按量化 Y 分组；量化键值同时用作矩形的上下边 Y 坐标。
    let mut h_by_y: BTreeMap<i64, Vec<&HorizontalLine>> = BTreeMap::new();
    for h in &h_lines {
        let key = (h.y / tolerance).round() as i64;
        h_by_y.entry(key).or_default().push(h);
    }

    let mut rectangles = Vec::new();
    let mut used_line_sets: HashSet<[Handle; 4]> = HashSet::new();

    for (&top_key, top_lines) in h_by_y.iter().rev() {
        let y_top = top_key as f64 * tolerance;
        for (&bottom_key, bottom_lines) in h_by_y.iter() {
            let y_bottom = bottom_key as f64 * tolerance;
            if y_bottom >= y_top - tolerance {
                continue;
            }

            for top_line in top_lines {
                for bottom_line in bottom_lines {
                    // 上下两条线的 X 重叠区间；太窄说明只是无关线的偶然交叠。
                    let x_min = top_line.x_min.max(bottom_line.x_min);
                    let x_max = top_line.x_max.min(bottom_line.x_max);
                    if x_max - x_min < min_length * 0.5 {
                        continue;
                    }

                    let mut left: Option<&VerticalLine> = None;
                    let mut right: Option<&VerticalLine> = None;
                    for v in &v_lines {
                        let spans_height =
                            v.y_min <= y_bottom + tolerance && v.y_max >= y_top - tolerance;
                        if !spans_height {
                            continue;
                        }
                        if (v.x - x_min).abs() < tolerance * 2.0 {
                            left = Some(v);
                        }
                        if (v.x - x_max).abs() < tolerance * 2.0 {
                            right = Some(v);
                        }
                    }

                    let (Some(left), Some(right)) = (left, right) else {
                        continue;
                    };

                    let mut key = [
                        top_line.handle.clone(),
                        bottom_line.handle.clone(),
                        left.handle.clone(),
                        right.handle.clone(),
                    ];
                    key.sort();
                    if !used_line_sets.insert(key) {
                        continue;
                    }

                    let bounds = Bounds2D::new(
                        Point2::new(x_min, y_bottom),
                        Point2::new(x_max, y_top),
                    );
                    rectangles.push(RectangleCandidate {
                        bounds,
                        center: bounds.center(),
                        width: x_max - x_min,
                        height: y_top - y_bottom,
                        lines: [
                            top_line.handle.clone(),
                            bottom_line.handle.clone(),
                            left.handle.clone(),
                            right.handle.clone(),
                        ],
                    });
                }
            }
        }
    }

    debug!(count = rectangles.len(), "矩形检测：完成");
    rectangles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LinkerConfig {
        LinkerConfig::default()
    }

    /// 在 (x, y) 起点处画一个 width × height 的四线矩形，返回四条线的句柄。
    fn add_box(drawing: &mut Drawing, x: f64, y: f64, width: f64, height: f64) -> [Handle; 4] {
        let top = drawing.add_line(
            Point2::new(x, y + height),
            Point2::new(x + width, y + height),
            "0",
        );
        let bottom = drawing.add_line(Point2::new(x, y), Point2::new(x + width, y), "0");
        let left = drawing.add_line(Point2::new(x, y), Point2::new(x, y + height), "0");
        let right = drawing.add_line(
            Point2::new(x + width, y),
            Point2::new(x + width, y + height),
            "0",
        );
        [top, bottom, left, right]
    }

    #[test]
    fn detects_a_four_line_box() {
        let mut drawing = Drawing::new();
        let lines = add_box(&mut drawing, 0.0, 0.0, 200.0, 150.0);

        let rects = detect_rectangles(&drawing, None, &config());
        assert_eq!(rects.len(), 1);
        let rect = &rects[0];
        assert!((rect.width - 200.0).abs() < 1e-9);
        assert!((rect.height - 150.0).abs() < 1e-9);
        assert!((rect.center.x() - 100.0).abs() < 1e-9);
        assert!((rect.center.y() - 75.0).abs() < 1e-9);
        let mut expected: Vec<_> = lines.to_vec();
        expected.sort();
        let mut actual = rect.lines.to_vec();
        actual.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn tolerates_endpoint_jitter_below_tolerance() {
        let mut drawing = Drawing::new();
        // 端点带 2 单位抖动（容差 5），仍应拼成一个矩形。
        drawing.add_line(Point2::new(-2.0, 151.0), Point2::new(201.0, 149.0), "0");
        drawing.add_line(Point2::new(1.0, -1.0), Point2::new(199.0, 1.0), "0");
        drawing.add_line(Point2::new(1.0, -2.0), Point2::new(-1.0, 152.0), "0");
        drawing.add_line(Point2::new(199.0, -1.0), Point2::new(201.0, 151.0), "0");

        let rects = detect_rectangles(&drawing, None, &config());
        assert_eq!(rects.len(), 1);
    }

    #[test]
    fn short_lines_are_not_boundaries() {
        let mut drawing = Drawing::new();
        // 100 单位的框低于最小边界长度 150，不应被当作矩形。
        add_box(&mut drawing, 0.0, 0.0, 100.0, 100.0);
        let rects = detect_rectangles(&drawing, None, &config());
        assert!(rects.is_empty());
    }

    #[test]
    fn diagonal_lines_are_ignored() {
        let mut drawing = Drawing::new();
        add_box(&mut drawing, 0.0, 0.0, 200.0, 150.0);
        drawing.add_line(Point2::new(0.0, 0.0), Point2::new(300.0, 300.0), "0");
        let rects = detect_rectangles(&drawing, None, &config());
        assert_eq!(rects.len(), 1);
    }

    #[test]
    fn layer_filter_excludes_other_layers() {
        let mut drawing = Drawing::new();
        let top = drawing.add_line(Point2::new(0.0, 150.0), Point2::new(200.0, 150.0), "板情報");
        let bottom = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(200.0, 0.0), "板情報");
        let left = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(0.0, 150.0), "板情報");
        let right = drawing.add_line(Point2::new(200.0, 0.0), Point2::new(200.0, 150.0), "OTHER");
        let _ = (top, bottom, left, right);

        // 右边线在别的图层上，目标图层内凑不齐四条边。
        let rects = detect_rectangles(&drawing, Some("板情報"), &config());
        assert!(rects.is_empty());

        let rects_all = detect_rectangles(&drawing, None, &config());
        assert_eq!(rects_all.len(), 1);
    }

    #[test]
    fn duplicate_rectangles_are_deduplicated() {
        let mut drawing = Drawing::new();
        add_box(&mut drawing, 0.0, 0.0, 200.0, 150.0);
        // 同一物理矩形只输出一次，即便配对顺序存在对称重复。
        let rects = detect_rectangles(&drawing, None, &config());
        assert_eq!(rects.len(), 1);
    }

    #[test]
    fn two_separate_boxes_are_both_found() {
        let mut drawing = Drawing::new();
        add_box(&mut drawing, 0.0, 0.0, 200.0, 150.0);
        add_box(&mut drawing, 1_000.0, 0.0, 300.0, 200.0);
        let rects = detect_rectangles(&drawing, None, &config());
        assert_eq!(rects.len(), 2);
    }
}
