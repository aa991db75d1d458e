// 该文件是 Yichu （衣橱） 项目的一部分。
// src/smoother.rs - 肩部关键点平滑
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

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::DEFAULT_SMOOTHING_WINDOW;

/// 像素坐标点
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PixelPoint {
  pub x: f32,
  pub y: f32,
}

impl PixelPoint {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 同一帧的左右肩像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShoulderPair {
  pub left: PixelPoint,
  pub right: PixelPoint,
}

impl ShoulderPair {
  pub fn new(left: PixelPoint, right: PixelPoint) -> Self {
    Self { left, right }
  }
}

/// 平滑后的左右肩位置，服装摆放的锚点
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SmoothedAnchor {
  pub left: PixelPoint,
  pub right: PixelPoint,
}

/// 最近 N 帧肩部位置的滑动平均
///
/// 窗口未满时只对已有的帧求平均。未检测到人体的帧不调用 `push`，
/// 锚点保持上一次的值。
#[derive(Debug, Clone)]
pub struct LandmarkSmoother {
  capacity: usize,
  history: VecDeque<ShoulderPair>,
  anchor: Option<SmoothedAnchor>,
}

impl Default for LandmarkSmoother {
  fn default() -> Self {
    Self::new(DEFAULT_SMOOTHING_WINDOW)
  }
}

impl LandmarkSmoother {
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      capacity,
      history: VecDeque::with_capacity(capacity),
      anchor: None,
    }
  }

  pub fn push(&mut self, pair: ShoulderPair) -> SmoothedAnchor {
    if self.history.len() == self.capacity {
      self.history.pop_front();
    }
    self.history.push_back(pair);

    let n = self.history.len() as f32;
    let (mut left, mut right) = (PixelPoint::default(), PixelPoint::default());
    for pair in &self.history {
      left.x += pair.left.x;
      left.y += pair.left.y;
      right.x += pair.right.x;
      right.y += pair.right.y;
    }

    let anchor = SmoothedAnchor {
      left: PixelPoint::new(left.x / n, left.y / n),
      right: PixelPoint::new(right.x / n, right.y / n),
    };
    self.anchor = Some(anchor);
    anchor
  }

  /// 最近一次的锚点；从未推入过则为 None
  pub fn anchor(&self) -> Option<SmoothedAnchor> {
    self.anchor
  }

  pub fn len(&self) -> usize {
    self.history.len()
  }

  pub fn is_empty(&self) -> bool {
    self.history.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn reset(&mut self) {
    self.history.clear();
    self.anchor = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pair(lx: f32, ly: f32, rx: f32, ry: f32) -> ShoulderPair {
    ShoulderPair::new(PixelPoint::new(lx, ly), PixelPoint::new(rx, ry))
  }

  #[test]
  fn test_warm_up_averages_what_is_present() {
    let mut s = LandmarkSmoother::new(5);
    let first = s.push(pair(100.0, 200.0, 300.0, 210.0));
    assert_eq!(first.left, PixelPoint::new(100.0, 200.0));
    assert_eq!(first.right, PixelPoint::new(300.0, 210.0));

    let second = s.push(pair(110.0, 204.0, 310.0, 214.0));
    assert_eq!(second.left, PixelPoint::new(105.0, 202.0));
    assert_eq!(second.right, PixelPoint::new(305.0, 212.0));
    assert_eq!(s.len(), 2);
  }

  #[test]
  fn test_full_window_uses_last_n_only() {
    let mut s = LandmarkSmoother::new(3);
    for x in [0.0, 10.0, 20.0, 30.0, 40.0] {
      s.push(pair(x, x, x + 100.0, 2.0 * x));
    }
    let anchor = s.anchor().unwrap();
    // 只剩 20, 30, 40
    assert_eq!(anchor.left, PixelPoint::new(30.0, 30.0));
    assert_eq!(anchor.right, PixelPoint::new(130.0, 60.0));
    assert_eq!(s.len(), 3);
  }

  #[test]
  fn test_anchor_persists_without_push() {
    let mut s = LandmarkSmoother::default();
    assert!(s.anchor().is_none());
    let anchor = s.push(pair(1.0, 2.0, 3.0, 4.0));
    assert_eq!(s.anchor(), Some(anchor));
    assert_eq!(s.anchor(), Some(anchor));
  }

  #[test]
  fn test_zero_capacity_is_clamped() {
    let mut s = LandmarkSmoother::new(0);
    assert_eq!(s.capacity(), 1);
    s.push(pair(1.0, 1.0, 1.0, 1.0));
    let anchor = s.push(pair(3.0, 3.0, 3.0, 3.0));
    assert_eq!(anchor.left, PixelPoint::new(3.0, 3.0));
  }

  #[test]
  fn test_reset_clears_history() {
    let mut s = LandmarkSmoother::default();
    s.push(pair(1.0, 1.0, 1.0, 1.0));
    s.reset();
    assert!(s.is_empty());
    assert!(s.anchor().is_none());
  }
}
