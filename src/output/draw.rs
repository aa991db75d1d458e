// 该文件是 Yichu （衣橱） 项目的一部分。
// src/output/draw.rs - 画面标注绘制
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use thiserror::Error;
use tracing::info;

use crate::{
  gesture::Gesture,
  landmark::{POSE_CONNECTIONS, PoseLandmarks},
};

// 文本渲染常量
const GESTURE_FONT_SIZE: f32 = 24.0;
const INFO_FONT_SIZE: f32 = 21.0;
const LANDMARK_RADIUS: i32 = 3;
const CONNECTION_COLOR: [u8; 3] = [255, 255, 255];
const LANDMARK_COLOR: [u8; 3] = [255, 0, 0];
const GESTURE_COLOR: [u8; 3] = [0, 255, 0];
const INFO_COLOR: [u8; 3] = [255, 255, 255];
const CART_COLOR: [u8; 3] = [255, 255, 0];
// 购物车提示距右边缘的距离
const CART_TEXT_RIGHT_MARGIN: i32 = 200;
const UI_MARGIN: i32 = 50;

#[derive(Error, Debug)]
pub enum FontError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体解析错误: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, FontError> {
  let data = std::fs::read(path.as_ref())?;
  let font = FontArc::try_from_vec(data)?;
  info!("已加载字体: {}", path.as_ref().display());
  Ok(font)
}

/// 叠加在推流画面上的提示信息
#[derive(Debug, Clone, Default)]
pub struct UiOverlay {
  /// 去抖窗口内的最近手势
  pub gesture: Option<Gesture>,
  /// (当前编号, 总数)，库存为空时为 None
  pub garment_position: Option<(usize, usize)>,
  pub cart_count: usize,
}

/// 在帧上绘制骨架、文字和半透明底框
#[derive(Clone)]
pub struct Draw {
  font: FontArc,
}

impl Default for Draw {
  fn default() -> Self {
    let font_data: &'static [u8] = include_bytes!("../../assets/font.ttf"); // default font
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");
    Self { font }
  }
}

impl Draw {
  pub fn new(font: FontArc) -> Self {
    Self { font }
  }

  /// 以基线左端为起点绘制一行文字
  pub fn draw_text(
    &self,
    image: &mut RgbImage,
    text: &str,
    x: i32,
    baseline: i32,
    size: f32,
    color: [u8; 3],
  ) {
    let top = baseline - size as i32;
    draw_text_mut(image, Rgb(color), x, top, PxScale::from(size), &self.font, text);
  }

  /// 将矩形区域与纯色按 `opacity` 混合，矩形超出画面的部分被裁掉
  pub fn blend_rect(
    &self,
    image: &mut RgbImage,
    (x0, y0): (i32, i32),
    (x1, y1): (i32, i32),
    color: [u8; 3],
    opacity: f32,
  ) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let (x0, x1) = (x0.clamp(0, w), x1.clamp(0, w));
    let (y0, y1) = (y0.clamp(0, h), y1.clamp(0, h));
    let keep = 1.0 - opacity;

    for y in y0..y1 {
      for x in x0..x1 {
        let pixel = image.get_pixel_mut(x as u32, y as u32);
        for c in 0..3 {
          pixel[c] = (pixel[c] as f32 * keep + color[c] as f32 * opacity)
            .round()
            .clamp(0.0, 255.0) as u8;
        }
      }
    }
  }

  pub fn draw_pose(&self, image: &mut RgbImage, pose: &PoseLandmarks) {
    let (w, h) = image.dimensions();
    let pixel = |joint| {
      let (x, y) = pose.joint(joint).to_pixel(w, h);
      (x as f32, y as f32)
    };

    for &(from, to) in POSE_CONNECTIONS {
      draw_line_segment_mut(image, pixel(from), pixel(to), Rgb(CONNECTION_COLOR));
    }

    for &(from, to) in POSE_CONNECTIONS {
      for joint in [from, to] {
        let (x, y) = pose.joint(joint).to_pixel(w, h);
        draw_filled_circle_mut(image, (x, y), LANDMARK_RADIUS, Rgb(LANDMARK_COLOR));
      }
    }
  }

  pub fn draw_ui_overlay(&self, image: &mut RgbImage, overlay: &UiOverlay) {
    let (w, h) = (image.width() as i32, image.height() as i32);

    if let Some(gesture) = overlay.gesture {
      let text = format!("Gesture: {}", gesture.title());
      self.draw_text(image, &text, UI_MARGIN, UI_MARGIN, GESTURE_FONT_SIZE, GESTURE_COLOR);
    }

    if let Some((index, total)) = overlay.garment_position {
      let text = format!("Shirt {}/{}", index + 1, total);
      self.draw_text(image, &text, UI_MARGIN, h - UI_MARGIN, INFO_FONT_SIZE, INFO_COLOR);
    }

    if overlay.cart_count > 0 {
      let text = format!("Cart: {} items", overlay.cart_count);
      self.draw_text(
        image,
        &text,
        w - CART_TEXT_RIGHT_MARGIN,
        UI_MARGIN,
        INFO_FONT_SIZE,
        CART_COLOR,
      );
    }
  }
}
