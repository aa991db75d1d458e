// 该文件是 Yichu （衣橱） 项目的一部分。
// src/compositor.rs - 服装贴图合成
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

use image::{
  DynamicImage, RgbImage, RgbaImage,
  imageops::{self, FilterType},
};
use serde::Serialize;

use crate::smoother::SmoothedAnchor;

/// 服装宽度与肩宽之比（经验值），(分子, 分母)
pub const GARMENT_WIDTH_RATIO: (i64, i64) = (262, 190);
/// 服装高宽比，(分子, 分母)
pub const GARMENT_ASPECT_RATIO: (i64, i64) = (591, 490);
// 让服装盖住躯干而不是贴着肩线
const HORIZONTAL_OFFSET_PERCENT: i64 = 15;
const VERTICAL_OFFSET_PERCENT: i64 = 20;

/// 带透明通道的服装贴图
pub type GarmentSprite = RgbaImage;

/// 解码后的图像统一转为 RGBA；没有透明通道的图像得到全不透明的 alpha
pub fn sprite_from_image(image: DynamicImage) -> GarmentSprite {
  image.to_rgba8()
}

/// 服装在画面中的位置与尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GarmentPlacement {
  pub x: i32,
  pub y: i32,
  pub width: u32,
  pub height: u32,
}

impl GarmentPlacement {
  /// 由平滑后的肩部锚点计算服装位置，宽度为零时返回 None
  pub fn from_anchor(anchor: &SmoothedAnchor, frame_width: u32, frame_height: u32) -> Option<Self> {
    let (lx, ly) = (anchor.left.x as i64, anchor.left.y as i64);
    let (rx, ry) = (anchor.right.x as i64, anchor.right.y as i64);

    // 比例都是整数之比，用整数运算截断，避免 262/190 这类浮点误差
    let width = (lx - rx).abs() * GARMENT_WIDTH_RATIO.0 / GARMENT_WIDTH_RATIO.1;
    let height = width * GARMENT_ASPECT_RATIO.0 / GARMENT_ASPECT_RATIO.1;
    if width <= 0 || height <= 0 {
      return None;
    }

    let x = (lx.min(rx) - width * HORIZONTAL_OFFSET_PERCENT / 100)
      .min(frame_width as i64 - width)
      .max(0);
    let y = (ly.min(ry) - height * VERTICAL_OFFSET_PERCENT / 100)
      .min(frame_height as i64 - height)
      .max(0);

    Some(Self {
      x: i32::try_from(x).ok()?,
      y: i32::try_from(y).ok()?,
      width: u32::try_from(width).ok()?,
      height: u32::try_from(height).ok()?,
    })
  }
}

/// 将 `sprite` 缩放到 `width`×`height` 后以 (x, y) 为左上角混合到 `background`
///
/// 起点先夹到画面内，超出右边和下边的部分被裁掉；缩放按请求的尺寸进行，
/// 裁剪只影响拷贝的范围。完全落在画面之外时不做任何修改。
/// 返回是否有像素被写入。
pub fn overlay_alpha(
  background: &mut RgbImage,
  sprite: &GarmentSprite,
  x: i32,
  y: i32,
  width: u32,
  height: u32,
) -> bool {
  let (bg_width, bg_height) = background.dimensions();
  if bg_width == 0 || bg_height == 0 || width == 0 || height == 0 {
    return false;
  }
  if sprite.width() == 0 || sprite.height() == 0 {
    return false;
  }

  let (right, bottom) = (x as i64 + width as i64, y as i64 + height as i64);
  if x >= bg_width as i32 || y >= bg_height as i32 || right <= 0 || bottom <= 0 {
    return false;
  }

  let x = x.clamp(0, bg_width as i32 - 1) as u32;
  let y = y.clamp(0, bg_height as i32 - 1) as u32;
  let visible_width = width.min(bg_width - x);
  let visible_height = height.min(bg_height - y);
  if visible_width == 0 || visible_height == 0 {
    return false;
  }

  let resized;
  let sprite = if sprite.dimensions() == (width, height) {
    sprite
  } else {
    resized = imageops::resize(sprite, width, height, FilterType::Triangle);
    &resized
  };

  for sy in 0..visible_height {
    for sx in 0..visible_width {
      let fg = sprite.get_pixel(sx, sy);
      let alpha = fg[3] as f32 / 255.0;
      if fg[3] == 0 {
        continue;
      }
      let bg = background.get_pixel_mut(x + sx, y + sy);
      for c in 0..3 {
        bg[c] = ((1.0 - alpha) * bg[c] as f32 + alpha * fg[c] as f32).clamp(0.0, 255.0) as u8;
      }
    }
  }

  true
}

/// 按锚点摆放并合成服装，返回实际使用的摆放位置
pub fn composite_garment(
  frame: &mut RgbImage,
  sprite: &GarmentSprite,
  anchor: &SmoothedAnchor,
) -> Option<GarmentPlacement> {
  let placement = GarmentPlacement::from_anchor(anchor, frame.width(), frame.height())?;
  overlay_alpha(
    frame,
    sprite,
    placement.x,
    placement.y,
    placement.width,
    placement.height,
  )
  .then_some(placement)
}
