// 该文件是 Yichu （衣橱） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
  fs::File,
  io::BufWriter,
  path::{Path, PathBuf},
  sync::atomic::{AtomicU32, Ordering},
};

use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme, frame::RgbFrame, output::Render, pipeline::FrameReport, url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期分目录保存帧
///
/// `folder:///path?record` 同时写出同名 `.json` 摘要；默认只保存检测到人体、
/// 派发了手势或拍了照的帧，加 `always` 保存每一帧。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: bool,
  always: bool,
  frame_counter: AtomicU32,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url_path(uri)),
      record,
      always,
      frame_counter: AtomicU32::new(0),
    })
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      record: false,
      always: false,
      frame_counter: AtomicU32::new(0),
    }
  }

  pub fn with_record(mut self, record: bool) -> Self {
    self.record = record;
    self
  }

  pub fn with_always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  fn frame_id(&self) -> u32 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RgbFrame, FrameReport> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbFrame, report: &FrameReport) -> Result<(), Self::Error> {
    if !self.always && !report.is_notable() {
      return Ok(());
    }

    let path = self.frame_path()?;
    frame.image().save(&path)?;
    if self.record {
      let writer = BufWriter::new(File::create(path.with_extension("json"))?);
      serde_json::to_writer_pretty(writer, report)?;
    }
    debug!("记录第 {} 帧: {}", report.frame_index, path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use image::{Rgb, RgbImage};

  use super::*;
  use crate::gesture::Gesture;

  fn saved_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  #[test]
  fn test_skips_quiet_frames_and_writes_sidecar() {
    let dir = std::env::temp_dir().join(format!("yichu-record-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let url = url::Url::parse(&format!("folder://{}?record", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let frame = RgbFrame::new(RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])), 7, 0);

    output.render_result(&frame, &FrameReport::default()).unwrap();
    assert!(!dir.exists());

    let report = FrameReport {
      frame_index: 7,
      dispatched: vec![Gesture::AddToCart],
      ..Default::default()
    };
    output.render_result(&frame, &report).unwrap();

    let files = saved_files(&dir);
    assert_eq!(files.len(), 2);
    let sidecar = files
      .iter()
      .find(|p| p.extension().is_some_and(|e| e == "json"))
      .unwrap();
    let value: serde_json::Value =
      serde_json::from_reader(File::open(sidecar).unwrap()).unwrap();
    assert_eq!(value["frame_index"], 7);
    assert_eq!(value["dispatched"][0], "add_to_cart");
  }

  #[test]
  fn test_always_saves_every_frame() {
    let dir = std::env::temp_dir().join(format!("yichu-record-always-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let output = DirectoryRecordOutput::new(&dir).with_always(true);
    let frame = RgbFrame::new(RgbImage::new(2, 2), 0, 0);
    output.render_result(&frame, &FrameReport::default()).unwrap();
    output.render_result(&frame, &FrameReport::default()).unwrap();
    assert_eq!(saved_files(&dir).len(), 2);
  }
}
