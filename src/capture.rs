// 该文件是 Yichu （衣橱） 项目的一部分。
// src/capture.rs - 试穿拍照
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

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::RgbImage;
use thiserror::Error;
use tracing::info;

use crate::{config::DEFAULT_STORE_LABEL, output::draw::Draw};

const PHOTO_PREFIX: &str = "virtual_tryout_";
const PHOTO_EXTENSION: &str = "jpg";

// 底框位置：距左 10，距底 10，高 70
const PANEL_LEFT: i32 = 10;
const PANEL_RIGHT: i32 = 400;
const PANEL_TOP_FROM_BOTTOM: i32 = 80;
const PANEL_BOTTOM_FROM_BOTTOM: i32 = 10;
const PANEL_OPACITY: f32 = 0.3;

const TEXT_LEFT: i32 = 20;
const LABEL_FONT_SIZE: f32 = 18.0;
const DETAIL_FONT_SIZE: f32 = 15.0;
const LABEL_COLOR: [u8; 3] = [255, 255, 255];
const TIME_COLOR: [u8; 3] = [0, 255, 255];
const GARMENT_COLOR: [u8; 3] = [255, 255, 0];

#[derive(Error, Debug)]
pub enum CaptureError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("照片不存在: {0}")]
  NotFound(String),
}

/// 一次拍照的结果
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPhoto {
  pub filename: String,
  pub path: PathBuf,
  pub captured_at: DateTime<Local>,
}

pub fn photo_filename(at: DateTime<Local>) -> String {
  format!(
    "{}{}.{}",
    PHOTO_PREFIX,
    at.format("%Y%m%d_%H%M%S"),
    PHOTO_EXTENSION
  )
}

/// 把合成后的画面加上店名、时间和服装名后存为 JPEG
#[derive(Clone)]
pub struct CaptureController {
  directory: PathBuf,
  store_label: String,
  draw: Draw,
}

impl CaptureController {
  pub fn new(directory: impl AsRef<Path>) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      store_label: DEFAULT_STORE_LABEL.to_string(),
      draw: Draw::default(),
    }
  }

  pub fn with_store_label(mut self, label: impl Into<String>) -> Self {
    self.store_label = label.into();
    self
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// 在图像副本左下角叠加半透明底框与三行文字
  pub fn annotate(
    &self,
    image: &RgbImage,
    garment_name: Option<&str>,
    at: DateTime<Local>,
  ) -> RgbImage {
    let mut photo = image.clone();
    let h = photo.height() as i32;

    self.draw.blend_rect(
      &mut photo,
      (PANEL_LEFT, h - PANEL_TOP_FROM_BOTTOM),
      (PANEL_RIGHT, h - PANEL_BOTTOM_FROM_BOTTOM),
      [0, 0, 0],
      PANEL_OPACITY,
    );

    self.draw.draw_text(
      &mut photo,
      &self.store_label,
      TEXT_LEFT,
      h - 60,
      LABEL_FONT_SIZE,
      LABEL_COLOR,
    );
    let time = format!("Captured: {}", at.format("%Y-%m-%d %H:%M:%S"));
    self
      .draw
      .draw_text(&mut photo, &time, TEXT_LEFT, h - 40, DETAIL_FONT_SIZE, TIME_COLOR);
    if let Some(name) = garment_name {
      let text = format!("Shirt: {}", name);
      self
        .draw
        .draw_text(&mut photo, &text, TEXT_LEFT, h - 20, DETAIL_FONT_SIZE, GARMENT_COLOR);
    }

    photo
  }

  /// 标注并保存照片，同一秒内的多次拍照写入同一个文件
  pub fn capture(
    &self,
    image: &RgbImage,
    garment_name: Option<&str>,
  ) -> Result<CapturedPhoto, CaptureError> {
    self.capture_at(image, garment_name, Local::now())
  }

  pub fn capture_at(
    &self,
    image: &RgbImage,
    garment_name: Option<&str>,
    at: DateTime<Local>,
  ) -> Result<CapturedPhoto, CaptureError> {
    std::fs::create_dir_all(&self.directory)?;

    let photo = self.annotate(image, garment_name, at);
    let filename = photo_filename(at);
    let path = self.directory.join(&filename);
    photo.save(&path)?;
    info!("照片已保存: {}", path.display());

    Ok(CapturedPhoto {
      filename,
      path,
      captured_at: at,
    })
  }

  /// 已保存照片的路径；只接受本目录下的文件名
  pub fn photo_path(&self, filename: &str) -> Result<PathBuf, CaptureError> {
    let is_plain = Path::new(filename)
      .file_name()
      .map(|name| name == filename)
      .unwrap_or(false);
    if !is_plain {
      return Err(CaptureError::NotFound(filename.to_string()));
    }

    let path = self.directory.join(filename);
    if !path.is_file() {
      return Err(CaptureError::NotFound(filename.to_string()));
    }
    Ok(path)
  }

  /// 读取已保存照片的 JPEG 数据
  pub fn read_photo(&self, filename: &str) -> Result<Vec<u8>, CaptureError> {
    Ok(std::fs::read(self.photo_path(filename)?)?)
  }
}
