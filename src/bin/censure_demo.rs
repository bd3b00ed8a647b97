/// CenSurE 实时特征跟踪
///
/// 主程序入口 - 直接运行: cargo run --release --features camera,display --bin censure_demo
/// 不带参数时打开摄像头0, 352x288, 八边形滤波器; 按 ESC 退出
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use image::RgbImage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use censure_track::error::Result as TrackResult;
use censure_track::input::CaptureDevice;
use censure_track::renderer::MinifbWindow;
use censure_track::{
    Annotator, Args, CensureConfig, CensureDetector, ExitReason, PatternCapture, Source,
    TrackerConfig, TrackingLoop,
};

#[cfg(feature = "camera")]
use censure_track::input::CameraCapture;
#[cfg(not(feature = "camera"))]
use censure_track::TrackError;

/// 合成图案的随机种子
const PATTERN_SEED: u64 = 7;

/// 运行时选择的帧来源
enum Capture {
    #[cfg(feature = "camera")]
    Camera(CameraCapture),
    Pattern(PatternCapture),
}

impl CaptureDevice for Capture {
    fn configure(&mut self, width: u32, height: u32) -> TrackResult<()> {
        match self {
            #[cfg(feature = "camera")]
            Capture::Camera(c) => c.configure(width, height),
            Capture::Pattern(p) => p.configure(width, height),
        }
    }

    fn query_frame(&mut self) -> Option<&mut RgbImage> {
        match self {
            #[cfg(feature = "camera")]
            Capture::Camera(c) => c.query_frame(),
            Capture::Pattern(p) => p.query_frame(),
        }
    }
}

fn open_capture(source: Source, index: usize, width: u32, height: u32) -> TrackResult<Capture> {
    match source {
        #[cfg(feature = "camera")]
        Source::Camera => CameraCapture::open(index).map(Capture::Camera),
        #[cfg(not(feature = "camera"))]
        Source::Camera => Err(TrackError::CaptureOpen {
            index,
            reason: "camera support not built, rebuild with --features camera".to_string(),
        }),
        Source::Pattern => {
            info!("🎨 使用合成测试图案 (种子 {})", PATTERN_SEED);
            Ok(Capture::Pattern(PatternCapture::new(PATTERN_SEED, width, height)))
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitReason> {
    let mut config = TrackerConfig::load(&args.config).context("加载配置失败")?;
    config.apply(&args);
    config.validate().context("配置无效")?;
    config.print_summary();

    let detector_config = config.detector.clone();
    let matcher_config = config.matcher.clone();
    let (width, height) = (config.capture.width, config.capture.height);
    let annotator = Annotator::new(config.render.palette.clone());
    let mut window = MinifbWindow::new(&config.display.window_name);

    let tracking = TrackingLoop::init(
        config,
        annotator,
        |filter, w, h| {
            CensureDetector::new(
                CensureConfig {
                    filter,
                    ..detector_config
                },
                matcher_config,
                w,
                h,
            )
        },
        |index| open_capture(args.source, index, width, height),
    )
    .context("初始化失败")?
    .with_frame_limit(args.max_frames);

    let outcome = tracking.run(&mut window)?;
    Ok(outcome.exit)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(exit) => {
            info!("✅ 正常退出: {:?}", exit);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
