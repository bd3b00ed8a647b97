//! 跟踪器配置 - 通过JSON文件和命令行调整参数
//!
//! 默认值与内置常量一致: 不带参数运行时行为不变

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detection::{CensureConfig, FilterKind, MatcherConfig};
use crate::error::{Result, TrackError};
use crate::renderer::Palette;

/// 采集参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: usize, // 摄像头索引
    pub width: u32,    // 请求宽度
    pub height: u32,   // 请求高度
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: 0,
            width: 352,
            height: 288,
        }
    }
}

/// 标注参数
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// 标记半径, 0 表示按尺度自适应
    pub radius: u32,
    pub palette: Palette,
}

/// 窗口参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub window_name: String,
    pub poll_ms: u64,  // 每帧等待按键的时间 (限速)
    pub exit_key: u32, // 退出键码 (低8位比较)
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_name: "censure_demo".to_string(),
            poll_ms: 10,
            exit_key: 27,
        }
    }
}

/// 跟踪器参数配置
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub capture: CaptureConfig,
    pub detector: CensureConfig,
    pub matcher: MatcherConfig,
    pub render: RenderConfig,
    pub display: DisplayConfig,
}

impl TrackerConfig {
    /// 从JSON文件加载配置, 文件不存在时写入默认配置
    ///
    /// 文件存在但无法读取或解析时返回 `Config` 错误, 原文件保持不变
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => {
                let config: Self = serde_json::from_str(&json)
                    .map_err(|e| TrackError::Config(format!("{}: {}", path.display(), e)))?;
                config.validate()?;
                info!("✅ 配置已从 {} 加载", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                Ok(config)
            }
            // 无法读取的已有文件不覆盖
            Err(e) => Err(TrackError::Config(format!("{}: {}", path.display(), e))),
        }
    }

    /// 保存配置到JSON文件, 失败只记录日志
    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match serde_json::to_string_pretty(self) {
            Ok(json) => match fs::write(path, json) {
                Ok(()) => info!("💾 配置已保存到 {}", path.display()),
                Err(e) => warn!("❌ 保存配置失败: {}", e),
            },
            Err(e) => warn!("❌ 序列化配置失败: {}", e),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(TrackError::Config(format!(
                "capture size {}x{} must be non-zero",
                self.capture.width, self.capture.height
            )));
        }
        if self.display.exit_key > 255 {
            return Err(TrackError::Config(format!(
                "exit key {} does not fit in 8 bits",
                self.display.exit_key
            )));
        }
        Ok(())
    }

    /// 命令行参数覆盖配置文件
    pub fn apply(&mut self, args: &Args) {
        if let Some(device) = args.device {
            self.capture.device = device;
        }
        if let Some(width) = args.width {
            self.capture.width = width;
        }
        if let Some(height) = args.height {
            self.capture.height = height;
        }
        if let Some(filter) = args.filter {
            self.detector.filter = filter;
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前跟踪器配置:");
        info!(
            "  采集: 设备{} {}x{}",
            self.capture.device, self.capture.width, self.capture.height
        );
        info!(
            "  检测: {:?} 阈值{:.1} 最多{}个特征",
            self.detector.filter, self.detector.response_threshold, self.detector.max_features
        );
        info!(
            "  匹配: 半径{:.0} 距离{:.2} 比值{:.2}",
            self.matcher.search_radius, self.matcher.max_distance, self.matcher.ratio
        );
        match self.render.radius {
            0 => info!("  标记半径: 按尺度"),
            r => info!("  标记半径: {}", r),
        }
    }
}

/// 帧来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Source {
    /// 本地摄像头 (需要 `camera` 特性)
    #[default]
    Camera,
    /// 合成测试图案
    Pattern,
}

/// 实时特征跟踪参数
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "CenSurE 实时特征跟踪", long_about = None)]
pub struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "censure_track.json")]
    pub config: PathBuf,

    /// 摄像头索引
    #[arg(short, long)]
    pub device: Option<usize>,

    /// 采集宽度
    #[arg(long)]
    pub width: Option<u32>,

    /// 采集高度
    #[arg(long)]
    pub height: Option<u32>,

    /// 滤波器类型
    #[arg(short, long, value_enum)]
    pub filter: Option<FilterKind>,

    /// 帧来源
    #[arg(short, long, value_enum, default_value_t = Source::Camera)]
    pub source: Source,

    /// 处理n帧后正常退出 (0 = 不限)
    #[arg(long, default_value_t = 0)]
    pub max_frames: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("censure_track_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_defaults_match_builtin_constants() {
        let config = TrackerConfig::default();
        assert_eq!(config.capture.width, 352);
        assert_eq!(config.capture.height, 288);
        assert_eq!(config.capture.device, 0);
        assert_eq!(config.detector.filter, FilterKind::Octagon);
        assert_eq!(config.render.radius, 0);
        assert_eq!(config.render.palette.new, [0, 0, 255]);
        assert_eq!(config.display.exit_key, 27);
        assert_eq!(config.display.poll_ms, 10);
    }

    #[test]
    fn test_load_creates_missing_file() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);

        let config = TrackerConfig::load(&path).unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert!(path.exists());

        // 再次加载读到同样的内容
        let reloaded = TrackerConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{ "detector": { "filter": "box" }, "render": { "radius": 6 } }"#).unwrap();

        let config = TrackerConfig::load(&path).unwrap();
        assert_eq!(config.detector.filter, FilterKind::Box);
        assert_eq!(config.render.radius, 6);
        assert_eq!(config.capture, CaptureConfig::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unparsable_file_is_config_error() {
        let path = temp_path("broken");
        fs::write(&path, "{ not json").unwrap();

        let err = TrackerConfig::load(&path).unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_non_utf8_file_is_config_error() {
        let path = temp_path("non_utf8");
        let bytes = [0xff, 0xfe, b'{', b'}'];
        fs::write(&path, bytes).unwrap();

        let err = TrackerConfig::load(&path).unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
        // 不能被默认配置覆盖
        assert_eq!(fs::read(&path).unwrap(), bytes);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_directory_path_is_config_error() {
        let dir = std::env::temp_dir().join(format!("censure_track_dir_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let err = TrackerConfig::load(&dir).unwrap_err();
        assert!(matches!(err, TrackError::Config(_)));
        assert!(dir.is_dir());
        let _ = fs::remove_dir(&dir);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TrackerConfig::default();
        config.capture.width = 0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.display.exit_key = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "censure_demo",
            "--device",
            "2",
            "--width",
            "640",
            "--filter",
            "box",
            "--source",
            "pattern",
        ]);
        let mut config = TrackerConfig::default();
        config.apply(&args);

        assert_eq!(config.capture.device, 2);
        assert_eq!(config.capture.width, 640);
        assert_eq!(config.capture.height, 288);
        assert_eq!(config.detector.filter, FilterKind::Box);
        assert_eq!(args.source, Source::Pattern);
    }

    #[test]
    fn test_no_args_is_default_behaviour() {
        let args = Args::parse_from(["censure_demo"]);
        let mut config = TrackerConfig::default();
        config.apply(&args);
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(args.source, Source::Camera);
        assert_eq!(args.max_frames, 0);
    }
}
