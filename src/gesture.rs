// 该文件是 Yichu （衣橱） 项目的一部分。
// src/gesture.rs - 手势识别
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

use std::fmt;

use serde::Serialize;

use crate::landmark::{HandJoint, HandLandmarks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
  /// 竖大拇指，食指弯曲
  AddToCart,
  /// 食指指向右边
  NextGarment,
  /// 食指指向左边
  PreviousGarment,
  None,
}

impl Gesture {
  pub fn is_none(&self) -> bool {
    matches!(self, Gesture::None)
  }

  /// 界面上显示的名称
  pub fn title(&self) -> &'static str {
    match self {
      Gesture::AddToCart => "Add To Cart",
      Gesture::NextGarment => "Next Shirt",
      Gesture::PreviousGarment => "Previous Shirt",
      Gesture::None => "None",
    }
  }
}

impl fmt::Display for Gesture {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.title())
  }
}

/// 手势判定阈值，单位为摄像头像素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureThresholds {
  /// 拇指尖需要高出手腕的距离
  pub thumb_lift: i32,
  /// 食指尖需要在水平方向伸出手腕的距离
  pub index_reach: i32,
  /// 指向时食指尖与手腕允许的竖直偏差
  pub level_tolerance: i32,
  /// 阈值标定时的画面宽度；设置后按实际帧宽等比缩放
  pub reference_width: Option<u32>,
}

impl Default for GestureThresholds {
  fn default() -> Self {
    Self {
      thumb_lift: 40,
      index_reach: 60,
      level_tolerance: 40,
      reference_width: None,
    }
  }
}

impl GestureThresholds {
  pub fn with_reference_width(mut self, width: u32) -> Self {
    self.reference_width = (width > 0).then_some(width);
    self
  }

  /// 换算到实际帧宽下的阈值
  pub fn for_frame(&self, frame_width: u32) -> Self {
    let Some(reference) = self.reference_width else {
      return *self;
    };
    let scale = |v: i32| (v as i64 * frame_width as i64 / reference as i64) as i32;
    Self {
      thumb_lift: scale(self.thumb_lift),
      index_reach: scale(self.index_reach),
      level_tolerance: scale(self.level_tolerance),
      reference_width: self.reference_width,
    }
  }
}

/// 单只手的手势判定，无状态
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureClassifier {
  thresholds: GestureThresholds,
}

impl GestureClassifier {
  pub fn new(thresholds: GestureThresholds) -> Self {
    Self { thresholds }
  }

  pub fn thresholds(&self) -> GestureThresholds {
    self.thresholds
  }

  pub fn classify(&self, hand: &HandLandmarks, frame_width: u32, frame_height: u32) -> Gesture {
    let t = self.thresholds.for_frame(frame_width);
    let pixel = |joint: HandJoint| hand.joint(joint).to_pixel(frame_width, frame_height);

    let (wrist_x, wrist_y) = pixel(HandJoint::Wrist);
    let (_, thumb_y) = pixel(HandJoint::ThumbTip);
    let (index_x, index_y) = pixel(HandJoint::IndexTip);

    let thumb_tip = hand.joint(HandJoint::ThumbTip);
    let thumb_base = hand.joint(HandJoint::ThumbMcp);
    let index_tip = hand.joint(HandJoint::IndexTip);
    let index_base = hand.joint(HandJoint::IndexMcp);

    // 图像坐标 y 向下增大
    if thumb_y < wrist_y - t.thumb_lift && thumb_tip.y < thumb_base.y && index_tip.y > index_base.y
    {
      return Gesture::AddToCart;
    }

    let level = (index_y - wrist_y).abs() < t.level_tolerance;

    if index_x > wrist_x + t.index_reach && level && index_tip.x > index_base.x {
      return Gesture::NextGarment;
    }

    if index_x < wrist_x - t.index_reach && level && index_tip.x < index_base.x {
      return Gesture::PreviousGarment;
    }

    Gesture::None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::landmark::LandmarkPoint;

  const W: u32 = 1024;
  const H: u32 = 1024;

  /// 以像素坐标搭一只手，其余关键点都放在手腕处
  fn hand(
    wrist: (f32, f32),
    thumb_tip: (f32, f32),
    thumb_base: (f32, f32),
    index_tip: (f32, f32),
    index_base: (f32, f32),
  ) -> HandLandmarks {
    let p = |(x, y): (f32, f32)| LandmarkPoint::new(x / W as f32, y / H as f32);
    let mut hand = HandLandmarks::filled(p(wrist));
    hand.set_joint(HandJoint::ThumbTip, p(thumb_tip));
    hand.set_joint(HandJoint::ThumbMcp, p(thumb_base));
    hand.set_joint(HandJoint::IndexTip, p(index_tip));
    hand.set_joint(HandJoint::IndexMcp, p(index_base));
    hand
  }

  fn classify(hand: &HandLandmarks) -> Gesture {
    GestureClassifier::default().classify(hand, W, H)
  }

  #[test]
  fn test_thumbs_up_adds_to_cart() {
    let h = hand(
      (500.0, 500.0),
      (500.0, 450.0),
      (505.0, 480.0),
      (530.0, 495.0),
      (530.0, 480.0),
    );
    assert_eq!(classify(&h), Gesture::AddToCart);
  }

  #[test]
  fn test_thumbs_up_needs_curled_index() {
    let h = hand(
      (500.0, 500.0),
      (500.0, 450.0),
      (505.0, 480.0),
      (530.0, 470.0),
      (530.0, 480.0),
    );
    assert_eq!(classify(&h), Gesture::None);
  }

  #[test]
  fn test_thumb_lift_is_strict() {
    let h = hand(
      (500.0, 500.0),
      (500.0, 460.0),
      (505.0, 480.0),
      (530.0, 495.0),
      (530.0, 480.0),
    );
    assert_eq!(classify(&h), Gesture::None);
  }

  #[test]
  fn test_point_right_is_next() {
    let h = hand(
      (400.0, 500.0),
      (420.0, 510.0),
      (410.0, 505.0),
      (470.0, 505.0),
      (430.0, 500.0),
    );
    assert_eq!(classify(&h), Gesture::NextGarment);
  }

  #[test]
  fn test_point_left_is_previous() {
    let h = hand(
      (400.0, 500.0),
      (380.0, 510.0),
      (390.0, 505.0),
      (330.0, 495.0),
      (370.0, 500.0),
    );
    assert_eq!(classify(&h), Gesture::PreviousGarment);
  }

  #[test]
  fn test_pointing_with_large_vertical_deviation_is_none() {
    let h = hand(
      (400.0, 500.0),
      (420.0, 510.0),
      (410.0, 505.0),
      (470.0, 545.0),
      (430.0, 500.0),
    );
    assert_eq!(classify(&h), Gesture::None);
  }

  #[test]
  fn test_open_palm_is_none() {
    // 手掌张开朝上：所有指尖都在手腕正上方
    let h = hand(
      (500.0, 600.0),
      (440.0, 540.0),
      (470.0, 570.0),
      (490.0, 430.0),
      (490.0, 520.0),
    );
    assert_eq!(classify(&h), Gesture::None);
  }

  #[test]
  fn test_thresholds_follow_frame_width() {
    let t = GestureThresholds::default().with_reference_width(640);
    let scaled = t.for_frame(1280);
    assert_eq!((scaled.thumb_lift, scaled.index_reach), (80, 120));
    assert_eq!(t.for_frame(640).index_reach, 60);
    let fixed = GestureThresholds::default().with_reference_width(0);
    assert_eq!(fixed.for_frame(1280), GestureThresholds::default());
  }

  #[test]
  fn test_reference_width_scales_with_actual_frame() {
    // 食指伸出 70 像素；1024 宽的画面下，512 标定的阈值为 120，2048 标定的为 30
    let h = hand(
      (400.0, 500.0),
      (420.0, 510.0),
      (410.0, 505.0),
      (470.0, 505.0),
      (430.0, 500.0),
    );
    let coarse = GestureClassifier::new(GestureThresholds::default().with_reference_width(512));
    assert_eq!(coarse.classify(&h, W, H), Gesture::None);
    let fine = GestureClassifier::new(GestureThresholds::default().with_reference_width(2048));
    assert_eq!(fine.classify(&h, W, H), Gesture::NextGarment);
  }
}
