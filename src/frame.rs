// 该文件是 Yichu （衣橱） 项目的一部分。
// src/frame.rs - 视频帧定义
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

use image::RgbImage;

const RGB_CHANNELS: usize = 3;

/// 一帧 RGB 图像（HWC 排列，每通道 8 位）
///
/// 帧由产生它的那一轮流水线独占，交付之后即被丢弃；
/// 只有拍照时才会被克隆一份。
#[derive(Debug, Clone)]
pub struct RgbFrame {
  image: RgbImage,
  index: u64,
  timestamp_ms: u64,
}

impl RgbFrame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  /// 从 HWC 排列的 RGB 字节构造帧
  pub fn from_rgb_bytes(
    width: u32,
    height: u32,
    data: Vec<u8>,
    index: u64,
    timestamp_ms: u64,
  ) -> Option<Self> {
    if data.len() != RGB_CHANNELS * width as usize * height as usize {
      return None;
    }
    RgbImage::from_raw(width, height, data).map(|image| Self::new(image, index, timestamp_ms))
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn timestamp_ms(&self) -> u64 {
    self.timestamp_ms
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn image_mut(&mut self) -> &mut RgbImage {
    &mut self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }

  /// 水平镜像，摄像头画面按镜子的方式呈现
  pub fn mirror(&mut self) {
    image::imageops::flip_horizontal_in_place(&mut self.image);
  }
}

impl AsRef<[u8]> for RgbFrame {
  fn as_ref(&self) -> &[u8] {
    self.image.as_raw()
  }
}

impl AsMut<[u8]> for RgbFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut *self.image
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_rgb_bytes_checks_length() {
    assert!(RgbFrame::from_rgb_bytes(2, 2, vec![0; 12], 0, 0).is_some());
    assert!(RgbFrame::from_rgb_bytes(2, 2, vec![0; 11], 0, 0).is_none());
  }

  #[test]
  fn test_mirror_flips_columns() {
    let mut frame = RgbFrame::from_rgb_bytes(2, 1, vec![1, 2, 3, 4, 5, 6], 0, 0).unwrap();
    frame.mirror();
    assert_eq!(frame.as_ref(), &[4, 5, 6, 1, 2, 3]);
  }
}
