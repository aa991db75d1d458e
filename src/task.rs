// 该文件是 Yichu （衣橱） 项目的一部分。
// src/task.rs - 帧循环任务
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

use std::{
  sync::mpsc::Receiver,
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{info, warn};

use crate::{
  frame::RgbFrame,
  landmark::{Landmarks, Model},
  output::Render,
  pipeline::{FrameReport, TryOnPipeline},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 帧 → 检测 → 流水线 → 输出，返回本帧摘要
fn step<M, O, ME, RE>(
  pipeline: &mut TryOnPipeline,
  mut frame: RgbFrame,
  model: &M,
  output: &O,
) -> anyhow::Result<FrameReport>
where
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  M: Model<Input = RgbFrame, Output = Landmarks, Error = ME>,
  O: Render<RgbFrame, FrameReport, Error = RE>,
{
  pipeline.prepare(&mut frame);
  let landmarks = model.infer(&frame)?;
  let report = pipeline.process(&mut frame, &landmarks, Instant::now());
  output.render_result(&frame, &report)?;
  Ok(report)
}

fn install_interrupt() -> anyhow::Result<Receiver<()>> {
  let (tx, rx) = std::sync::mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .context("设置 Ctrl-C 处理函数失败")?;
  Ok(rx)
}

/// 只处理一帧，可选地同时拍照
pub struct OneShotTask {
  pipeline: TryOnPipeline,
  capture: bool,
}

impl OneShotTask {
  pub fn new(pipeline: TryOnPipeline) -> Self {
    Self {
      pipeline,
      capture: false,
    }
  }

  pub fn with_capture(mut self, capture: bool) -> Self {
    self.capture = capture;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbFrame>,
  M: Model<Input = RgbFrame, Output = Landmarks, Error = ME>,
  O: Render<RgbFrame, FrameReport, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(mut self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    if self.capture {
      self.pipeline.session().with(|s| s.request_capture());
    }

    let now = Instant::now();
    let report = step(&mut self.pipeline, frame, &model, &output)?;
    info!("处理完成，耗时: {:.2?}", now.elapsed());

    if let Some(error) = report.capture_error {
      anyhow::bail!("拍照失败: {}", error);
    }
    if let Some(photo) = report.captured {
      info!("照片: {}", photo);
    }
    Ok(())
  }
}

/// 持续处理直到输入耗尽、达到帧数或收到中断
pub struct ContinuousTask {
  pipeline: TryOnPipeline,
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn new(pipeline: TryOnPipeline) -> Self {
    Self {
      pipeline,
      frame_number: None,
      handle_interrupt: true,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// Ctrl-C 处理函数每个进程只能设置一次，嵌入其他程序时可关闭
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }

  pub fn pipeline(&self) -> &TryOnPipeline {
    &self.pipeline
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbFrame>,
  M: Model<Input = RgbFrame, Output = Landmarks, Error = ME>,
  O: Render<RgbFrame, FrameReport, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(mut self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = if self.handle_interrupt {
      Some(install_interrupt()?)
    } else {
      None
    };

    let session = self.pipeline.session().clone();
    session.with(|s| s.set_camera_active(true));

    let mut frame_count = 0;
    let mut now = Instant::now();
    let result = (|| -> anyhow::Result<()> {
      for frame in input {
        frame_count += 1;
        info!("处理第 {} 帧图像", frame_count);
        step(&mut self.pipeline, frame, &model, &output)?;
        info!("本帧完成，耗时: {:.2?}", now.elapsed());
        now = Instant::now();

        if self.frame_number.map(|n| frame_count >= n).unwrap_or(false) {
          info!("达到指定帧数 {}, 退出任务循环", frame_count);
          break;
        }
        if rx.as_ref().map(|rx| rx.try_recv().is_ok()).unwrap_or(false) {
          warn!("中断信号接收，退出任务循环");
          break;
        }
      }
      Ok(())
    })();

    session.with(|s| s.set_camera_active(false));
    info!("任务完成，共处理 {} 帧", frame_count);
    result
  }
}
