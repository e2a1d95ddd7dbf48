use std::collections::{HashMap, HashSet};

use cadlink_core::drawing::Handle;
use cadlink_core::geometry::{Bounds2D, Point2};

/// 均匀网格空间哈希索引。
///
/// 把 2D 平面切成边长 `cell_size` 的格子，实体按包围盒登记到它覆盖的
/// 每一个格子里，另有一张句柄到包围盒的查表。避免在大图纸上做 O(n²)
/// 的两两距离判定，同时不需要树结构的再平衡。
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f64,
    grid: HashMap<(i64, i64), Vec<Handle>>,
    bounds_by_handle: HashMap<Handle, Bounds2D>,
}

impl SpatialIndex {
    pub fn new(cell_size: f64) -> Self {
        debug_assert!(cell_size > 0.0);
        Self {
            cell_size,
            grid: HashMap::new(),
            bounds_by_handle: HashMap::new(),
        }
    }

    #[inline]
    fn cell_coords(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// 包围盒覆盖的格子坐标（闭区间）。
    fn cells_for_bounds(&self, bounds: &Bounds2D) -> Vec<(i64, i64)> {
        let (min_x, min_y) = self.cell_coords(bounds.min().x(), bounds.min().y());
        let (max_x, max_y) = self.cell_coords(bounds.max().x(), bounds.max().y());
        let mut cells = Vec::with_capacity(
            ((max_x - min_x + 1) * (max_y - min_y + 1)).max(1) as usize,
        );
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                cells.push((x, y));
            }
        }
        cells
    }

    /// 将实体登记进索引。重复插入按覆盖语义处理：
    /// 先清掉旧包围盒占用的格子，保证句柄在查表中恰好出现一次。
    pub fn insert(&mut self, handle: impl Into<Handle>, bounds: Bounds2D) {
        let handle = handle.into();
        if let Some(previous) = self.bounds_by_handle.get(&handle).copied() {
            for cell in self.cells_for_bounds(&previous) {
                if let Some(entries) = self.grid.get_mut(&cell) {
                    entries.retain(|entry| entry != &handle);
                }
            }
        }
        for cell in self.cells_for_bounds(&bounds) {
            self.grid.entry(cell).or_default().push(handle.clone());
        }
        self.bounds_by_handle.insert(handle, bounds);
    }

    /// 半径查询的粗筛：取中心点外扩 `radius` 的正方形覆盖到的所有格子，
    /// 返回其中实体句柄的去重并集。超出精确圆的误报在所难免，
    /// 调用方必须再做一次精确距离过滤。
    pub fn query_radius(&self, center: Point2, radius: f64) -> Vec<Handle> {
        let search = Bounds2D::new(
            Point2::new(center.x() - radius, center.y() - radius),
            Point2::new(center.x() + radius, center.y() + radius),
        );
        let mut seen: HashSet<&Handle> = HashSet::new();
        let mut candidates = Vec::new();
        for cell in self.cells_for_bounds(&search) {
            let Some(entries) = self.grid.get(&cell) else {
                continue;
            };
            for handle in entries {
                if seen.insert(handle) {
                    candidates.push(handle.clone());
                }
            }
        }
        candidates
    }

    #[inline]
    pub fn bounds_of(&self, handle: &str) -> Option<&Bounds2D> {
        self.bounds_by_handle.get(handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bounds_by_handle.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bounds_by_handle.is_empty()
    }
}
