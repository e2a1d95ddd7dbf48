use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub linker: LinkerConfig,
    #[serde(default)]
    pub labels: LabelConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `CADLINK_CONFIG`，
    /// 否则寻找 `./config/default.toml`。若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("CADLINK_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 距离回退的打分模式。
///
/// `Linear` 为标准算法（0.7 线性衰减到 0.5）；`Directional` 启用
/// 自适应半径加方向加权的实验性打分，默认不启用。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    #[default]
    Linear,
    Directional,
}

/// 链接引擎的全部可调参数，单位为图纸单位。
#[derive(Debug, Clone, Deserialize)]
pub struct LinkerConfig {
    /// 空间索引的网格边长。取大图纸密度与索引内存的折中。
    #[serde(default = "LinkerConfig::default_cell_size")]
    pub cell_size: f64,
    /// 视为部材边界的最小线段长度，过滤刻度线与填充线。
    #[serde(default = "LinkerConfig::default_min_boundary_line_length")]
    pub min_boundary_line_length: f64,
    /// 端点一致判定的容差，也是水平/垂直分类与坐标量化的步长。
    #[serde(default = "LinkerConfig::default_endpoint_tolerance")]
    pub endpoint_tolerance: f64,
    /// 最近矩形策略的接受阈值（中心距）。
    #[serde(default = "LinkerConfig::default_near_rectangle_distance")]
    pub near_rectangle_distance: f64,
    /// 最近闭合折线策略的接受阈值（中心距）。
    #[serde(default = "LinkerConfig::default_near_polyline_distance")]
    pub near_polyline_distance: f64,
    /// 距离回退的查询半径。
    #[serde(default = "LinkerConfig::default_fallback_radius")]
    pub fallback_radius: f64,
    /// 边界包含匹配的固定分值，高于任何回退分值。
    #[serde(default = "LinkerConfig::default_boundary_score")]
    pub boundary_score: f64,
    /// 成员数超过该值视为疑似噪声（误检边界吞了无关几何）。
    #[serde(default = "LinkerConfig::default_max_trusted_members")]
    pub max_trusted_members: usize,
    #[serde(default)]
    pub scoring: ScoringMode,
}

impl LinkerConfig {
    fn default_cell_size() -> f64 {
        500.0
    }

    fn default_min_boundary_line_length() -> f64 {
        150.0
    }

    fn default_endpoint_tolerance() -> f64 {
        5.0
    }

    fn default_near_rectangle_distance() -> f64 {
        300.0
    }

    fn default_near_polyline_distance() -> f64 {
        500.0
    }

    fn default_fallback_radius() -> f64 {
        300.0
    }

    fn default_boundary_score() -> f64 {
        0.95
    }

    fn default_max_trusted_members() -> usize {
        50
    }
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            cell_size: Self::default_cell_size(),
            min_boundary_line_length: Self::default_min_boundary_line_length(),
            endpoint_tolerance: Self::default_endpoint_tolerance(),
            near_rectangle_distance: Self::default_near_rectangle_distance(),
            near_polyline_distance: Self::default_near_polyline_distance(),
            fallback_radius: Self::default_fallback_radius(),
            boundary_score: Self::default_boundary_score(),
            max_trusted_members: Self::default_max_trusted_members(),
            scoring: ScoringMode::default(),
        }
    }
}

/// 部材名识别配置：正则模式表与优先图层表。
///
/// 原图纸约定部材编号为字母数字加连字符（如 `DF-01`、`510-1`），
/// 部材元数据集中在 `板情報` 图层。两张表都是显式配置，
/// 不存在进程级可变状态。
#[derive(Debug, Clone, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "LabelConfig::default_patterns")]
    pub patterns: Vec<String>,
    #[serde(default = "LabelConfig::default_preferred_layers")]
    pub preferred_layers: Vec<String>,
}

impl LabelConfig {
    fn default_patterns() -> Vec<String> {
        vec![
            r"DF-\d+".to_string(),
            r"D\d+番".to_string(),
            r"\d+-\d+".to_string(),
            r"[A-Z0-9]+-[A-Z0-9]+".to_string(),
        ]
    }

    fn default_preferred_layers() -> Vec<String> {
        vec!["板情報".to_string()]
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            patterns: Self::default_patterns(),
            preferred_layers: Self::default_preferred_layers(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
