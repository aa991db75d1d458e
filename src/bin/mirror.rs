// 该文件是 Yichu （衣橱） 项目的一部分。
// src/bin/mirror.rs - 试衣镜主程序
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

use yichu::{
  FromUrl,
  capture::CaptureController,
  command::CommandConsole,
  config::{DEFAULT_STORE_LABEL, TryOnConfig},
  gesture::GestureThresholds,
  input::InputWrapper,
  inventory::Inventory,
  landmark::DetectorWrapper,
  output::{
    OutputWrapper,
    draw::{Draw, load_font},
  },
  pipeline::TryOnPipeline,
  session::{Session, SharedSession},
  task::{ContinuousTask, Task},
};

/// Yichu 试衣镜参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，如 gst://camera/dev/video0
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 关键点来源，如 replay:///path/landmarks.jsonl
  #[arg(long, value_name = "DETECTOR", default_value = "none:")]
  pub detector: Url,
  /// 输出，如 mjpeg://0.0.0.0?port=5000
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 服装图片目录
  #[arg(long, value_name = "DIR", default_value = "static/Shirts")]
  pub garments: PathBuf,
  /// 照片保存目录
  #[arg(long, value_name = "DIR", default_value = "static/captured_photos")]
  pub captures: PathBuf,
  /// 画面文字使用的 TrueType 字体，默认使用内置字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  #[arg(long, default_value = DEFAULT_STORE_LABEL)]
  pub store_label: String,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 不对画面做水平镜像
  #[arg(long)]
  pub no_mirror: bool,
  /// 肩部平滑窗口
  #[arg(long, default_value_t = 5)]
  pub smoothing_window: usize,
  /// 手势去抖间隔（毫秒）
  #[arg(long, default_value_t = 1500)]
  pub debounce_ms: u64,
  /// 手势阈值标定时的画面宽度，设置后按实际帧宽等比缩放，不设置则使用固定像素阈值
  #[arg(long, value_name = "WIDTH")]
  pub gesture_reference_width: Option<u32>,
  /// 从标准输入读取命令
  #[arg(long)]
  pub console: bool,
}

impl Args {
  fn config(&self) -> TryOnConfig {
    let gesture = match self.gesture_reference_width {
      Some(reference) => GestureThresholds::default().with_reference_width(reference),
      None => GestureThresholds::default(),
    };
    TryOnConfig::default()
      .with_smoothing_window(self.smoothing_window)
      .with_debounce(Duration::from_millis(self.debounce_ms))
      .with_gesture(gesture)
      .with_mirror(!self.no_mirror)
      .with_store_label(self.store_label.clone())
  }

  fn draw(&self) -> Draw {
    match &self.font {
      Some(path) => match load_font(path) {
        Ok(font) => Draw::new(font),
        Err(e) => {
          warn!("字体加载失败，改用内置字体: {}", e);
          Draw::default()
        }
      },
      None => Draw::default(),
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = args.config();

  info!("输入来源: {}", args.input);
  info!("关键点来源: {}", args.detector);
  info!("输出路径: {}", args.output);

  let inventory = Arc::new(Inventory::from_directory(&args.garments)?);
  let session = SharedSession::new(Session::new(inventory));
  let draw = args.draw();
  let capture = CaptureController::new(&args.captures)
    .with_store_label(config.store_label.clone())
    .with_draw(draw.clone());

  if args.console {
    let console = CommandConsole::new(session.clone(), capture.clone());
    std::thread::spawn(move || {
      let stdin = std::io::stdin();
      if let Err(e) = console.run(stdin.lock(), std::io::stdout()) {
        error!("命令控制台退出: {}", e);
      }
    });
  }

  let input = InputWrapper::from_url(&args.input)?;
  let detector = DetectorWrapper::from_url(&args.detector)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let pipeline = TryOnPipeline::new(&config, session, capture, draw);
  ContinuousTask::new(pipeline)
    .with_frame_number(args.frame_number)
    .run_task(input, detector, output)?;

  Ok(())
}
