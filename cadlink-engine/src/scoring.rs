use cadlink_core::geometry::{Bounds2D, Point2};

/// 无图纸范围可用时的回退探索半径。
const DEFAULT_ADAPTIVE_RADIUS: f64 = 1_000.0;
const MIN_ADAPTIVE_RADIUS: f64 = 100.0;
const MAX_ADAPTIVE_RADIUS: f64 = 3_000.0;

/// 距离回退的线性打分：距离 0 得 0.7，衰减到半径边界处的 0.5。
#[inline]
pub fn linear_proximity_score(distance: f64, radius: f64) -> f64 {
    0.7 - (distance / radius) * 0.2
}

/// 部材级置信度。
///
/// 基础档位按成员数划分：0 个成员恒为 0.0；1..=max_trusted 个成员
/// 视为正常匹配（0.9）；超过 max_trusted 视为疑似噪声（0.5），
/// 例如误检的边界吞掉了大量无关几何。再按成员分值均值
/// 修正 `(mean - 0.5) × 0.2`，最终截断到 [0, 1]。
pub fn confidence(member_count: usize, scores: &[f64], max_trusted: usize) -> f64 {
    if member_count == 0 {
        return 0.0;
    }
    let base = if member_count <= max_trusted { 0.9 } else { 0.5 };
    let adjusted = if scores.is_empty() {
        base
    } else {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        base + (mean - 0.5) * 0.2
    };
    adjusted.clamp(0.0, 1.0)
}

/// 按图纸尺寸取自适应探索半径：宽高均值的 12%，
/// 夹在 [100, 3000] 之间；没有几何时用固定默认值。
pub fn adaptive_search_radius(bounds: Option<&Bounds2D>) -> f64 {
    let Some(bounds) = bounds else {
        return DEFAULT_ADAPTIVE_RADIUS;
    };
    if bounds.is_empty() {
        return DEFAULT_ADAPTIVE_RADIUS;
    }
    let avg_dimension = (bounds.width() + bounds.height()) / 2.0;
    (avg_dimension * 0.12).clamp(MIN_ADAPTIVE_RADIUS, MAX_ADAPTIVE_RADIUS)
}

/// 距离加方向的实验性打分（`scoring = "directional"` 时启用）。
///
/// 距离按指数衰减（半径处约 0.05）；方向沿用图纸惯例——
/// 标签通常标在几何上方，满足时加 10%，明显在下方则减 10%。
pub fn directional_match_score(
    text_center: Point2,
    entity_center: Point2,
    distance: f64,
    search_radius: f64,
) -> f64 {
    let distance_score = (-3.0 * distance / search_radius).exp();

    let dy = entity_center.y() - text_center.y();
    let direction_bonus = if dy < 0.0 {
        1.1
    } else if dy.abs() < search_radius * 0.1 {
        1.0
    } else {
        0.9
    };

    (distance_score * direction_bonus).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_score_decays_from_seven_tenths() {
        assert!((linear_proximity_score(0.0, 300.0) - 0.7).abs() < 1e-12);
        assert!((linear_proximity_score(150.0, 300.0) - 0.6).abs() < 1e-12);
        assert!((linear_proximity_score(300.0, 300.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(confidence(0, &[], 50), 0.0);
        // 边界包含匹配（0.95）：0.9 + 0.09 = 0.99。
        assert!((confidence(1, &[0.95], 50) - 0.99).abs() < 1e-12);
        assert!((confidence(50, &[0.95; 50], 50) - 0.99).abs() < 1e-12);
        // 成员过多降档到 0.5。
        assert!((confidence(51, &[0.95; 51], 50) - 0.59).abs() < 1e-12);
        // 均值低于 0.5 向下修正。
        assert!(confidence(2, &[0.4, 0.4], 50) < 0.9);
    }

    #[test]
    fn confidence_is_monotonic_in_mean_score() {
        for count in [2usize, 10, 50] {
            let mut previous = -1.0;
            for step in 0..=10 {
                let score = 0.5 + 0.05 * step as f64;
                let scores = vec![score; count];
                let value = confidence(count, &scores, 50);
                assert!(
                    value >= previous,
                    "confidence dropped at count={count} score={score}"
                );
                previous = value;
            }
        }
    }

    #[test]
    fn adaptive_radius_clamps_to_range() {
        assert_eq!(adaptive_search_radius(None), 1_000.0);

        let tiny = Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(10.0, 10.0));
        assert_eq!(adaptive_search_radius(Some(&tiny)), 100.0);

        let huge = Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(100_000.0, 100_000.0));
        assert_eq!(adaptive_search_radius(Some(&huge)), 3_000.0);

        let medium = Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(10_000.0, 10_000.0));
        assert!((adaptive_search_radius(Some(&medium)) - 1_200.0).abs() < 1e-9);
    }

    #[test]
    fn directional_score_prefers_label_above_geometry() {
        let text = Point2::new(0.0, 100.0);
        let below = Point2::new(0.0, 0.0);
        let above = Point2::new(0.0, 200.0);
        let score_below = directional_match_score(text, below, 100.0, 500.0);
        let score_above = directional_match_score(text, above, 100.0, 500.0);
        assert!(score_below > score_above);
        assert!(score_below <= 1.0 && score_above >= 0.0);
    }
}
