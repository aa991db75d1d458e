// 该文件是 Yichu （衣橱） 项目的一部分。
// src/config.rs - 试衣参数配置
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

use std::time::Duration;

use crate::gesture::GestureThresholds;

pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);
pub const DEFAULT_STORE_LABEL: &str = "Clothy Virtual Store";

/// 试衣流水线的可调参数
#[derive(Debug, Clone)]
pub struct TryOnConfig {
  /// 肩部平滑窗口长度
  pub smoothing_window: usize,
  /// 两次手势之间的最短间隔
  pub debounce: Duration,
  pub gesture: GestureThresholds,
  /// 检测前是否水平镜像画面
  pub mirror: bool,
  /// 拍照水印上的商店名称
  pub store_label: String,
}

impl Default for TryOnConfig {
  fn default() -> Self {
    Self {
      smoothing_window: DEFAULT_SMOOTHING_WINDOW,
      debounce: DEFAULT_DEBOUNCE,
      gesture: GestureThresholds::default(),
      mirror: true,
      store_label: DEFAULT_STORE_LABEL.to_string(),
    }
  }
}

impl TryOnConfig {
  pub fn with_smoothing_window(mut self, window: usize) -> Self {
    self.smoothing_window = window.max(1);
    self
  }

  pub fn with_debounce(mut self, debounce: Duration) -> Self {
    self.debounce = debounce;
    self
  }

  pub fn with_gesture(mut self, gesture: GestureThresholds) -> Self {
    self.gesture = gesture;
    self
  }

  pub fn with_mirror(mut self, mirror: bool) -> Self {
    self.mirror = mirror;
    self
  }

  pub fn with_store_label(mut self, label: impl Into<String>) -> Self {
    self.store_label = label.into();
    self
  }
}
