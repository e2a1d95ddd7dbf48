use std::path::PathBuf;

use cadlink_config::{AppConfig, ConfigError};
use cadlink_engine::EntityLinker;
use cadlink_io::{DrawingLoader, SnapshotFacade};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut layer_override: Option<String> = None;
    let mut snapshot_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--layer" => {
                let Some(layer) = args.next() else {
                    eprintln!("`--layer` 需要提供图层名");
                    std::process::exit(1);
                };
                layer_override = Some(layer);
            }
            other if !other.starts_with('-') && snapshot_path.is_none() => {
                snapshot_path = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let Some(snapshot_path) = snapshot_path else {
        eprintln!("用法：cadlink-app [--config 配置文件] [--layer 图层名] <图纸快照.json>");
        std::process::exit(1);
    };

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 CADLink 部材链接");

    let linker = match EntityLinker::from_app_config(&config) {
        Ok(linker) => linker,
        Err(err) => {
            error!(error = %err, "链接引擎配置无效");
            std::process::exit(1);
        }
    };

    let drawing = match SnapshotFacade::new().load(&snapshot_path) {
        Ok(drawing) => drawing,
        Err(err) => {
            error!(error = %err, "无法读取图纸快照");
            std::process::exit(1);
        }
    };
    info!(entities = drawing.len(), path = %snapshot_path.display(), "图纸快照已载入");

    let results = linker.link_entities_on_layer(&drawing, layer_override.as_deref());
    info!(parts = results.len(), "链接完成");

    match serde_json::to_string_pretty(&results) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            error!(error = %err, "序列化结果失败");
            std::process::exit(1);
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
