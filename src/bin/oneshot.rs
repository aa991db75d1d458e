// 该文件是 Yichu （衣橱） 项目的一部分。
// src/bin/oneshot.rs - 单张图片试衣
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

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use yichu::{
  FromUrl,
  capture::CaptureController,
  config::TryOnConfig,
  input::InputWrapper,
  inventory::Inventory,
  landmark::DetectorWrapper,
  output::{
    OutputWrapper,
    draw::{Draw, load_font},
  },
  pipeline::TryOnPipeline,
  session::{Session, SharedSession},
  task::{OneShotTask, Task},
};

/// 对一张图片试穿指定服装
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图片，如 image:///path/person.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 关键点来源，如 replay:///path/landmarks.jsonl
  #[arg(long, value_name = "DETECTOR")]
  pub detector: Url,
  /// 输出，如 image:///path/result.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[arg(long, value_name = "DIR", default_value = "static/Shirts")]
  pub garments: PathBuf,
  /// 试穿的服装编号
  #[arg(long, default_value_t = 0)]
  pub garment: usize,
  /// 同时拍一张带水印的照片
  #[arg(long)]
  pub capture: bool,
  #[arg(long, value_name = "DIR", default_value = "static/captured_photos")]
  pub captures: PathBuf,
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 对输入做水平镜像
  #[arg(long)]
  pub mirror: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("关键点来源: {}", args.detector);
  info!("输出路径: {}", args.output);

  let config = TryOnConfig::default().with_mirror(args.mirror);
  let inventory = Arc::new(Inventory::from_directory(&args.garments)?);
  let session = SharedSession::new(Session::new(inventory));
  session.with(|s| s.select(args.garment))?;

  let draw = match &args.font {
    Some(path) => Draw::new(load_font(path)?),
    None => Draw::default(),
  };
  let capture = CaptureController::new(&args.captures)
    .with_store_label(config.store_label.clone())
    .with_draw(draw.clone());

  let input = InputWrapper::from_url(&args.input)?;
  let detector = DetectorWrapper::from_url(&args.detector)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let pipeline = TryOnPipeline::new(&config, session, capture, draw);
  OneShotTask::new(pipeline)
    .with_capture(args.capture)
    .run_task(input, detector, output)?;

  Ok(())
}
