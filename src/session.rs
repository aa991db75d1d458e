// 该文件是 Yichu （衣橱） 项目的一部分。
// src/session.rs - 试衣会话状态
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

//! 会话保存跨帧的全部可变状态：当前服装、购物车、手势去抖、
//! 界面开关和拍照请求。帧循环和命令处理共用同一个 [`SharedSession`]，
//! 所有读改写都在同一把锁内完成。

use std::{
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::{Duration, Instant},
};

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  cart::{Cart, CartAdd, CartItem, CartSnapshot},
  config::DEFAULT_DEBOUNCE,
  gesture::Gesture,
  inventory::{Garment, Inventory},
};

const INITIAL_FIT: u32 = 85;
const INITIAL_TRACKING: u32 = 80;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
  #[error("无效的服装编号: {0}")]
  InvalidSelection(usize),
  #[error("没有可用的服装")]
  NoGarments,
  #[error("还没有拍摄照片")]
  NoPhoto,
}

/// 手势状态机所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
  /// 可以接受新手势
  Idle,
  /// 刚派发过手势，去抖窗口内的手势会被丢弃
  Cooldown,
}

/// 最近一次派发的手势及其时间
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureState {
  last: Option<(Gesture, Instant)>,
}

impl GestureState {
  pub fn last(&self) -> Option<(Gesture, Instant)> {
    self.last
  }

  pub fn phase(&self, now: Instant, debounce: Duration) -> GesturePhase {
    match self.last {
      Some((_, at)) if now.saturating_duration_since(at) <= debounce => GesturePhase::Cooldown,
      _ => GesturePhase::Idle,
    }
  }
}

/// 仅用于展示的贴合度与跟踪质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FitMetrics {
  pub fit_detection: u32,
  pub tracking_quality: u32,
}

impl Default for FitMetrics {
  fn default() -> Self {
    Self {
      fit_detection: INITIAL_FIT,
      tracking_quality: INITIAL_TRACKING,
    }
  }
}

impl FitMetrics {
  pub fn derive(garment_width: u32, smoothing_len: usize) -> Self {
    Self {
      fit_detection: (85 + garment_width % 15).min(98),
      tracking_quality: (80 + smoothing_len as u32 * 4).min(95),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
  pub camera_active: bool,
  pub current_shirt: usize,
  pub fit_detection: u32,
  pub tracking_quality: u32,
  pub total_shirts: usize,
  pub cart_count: usize,
  pub last_gesture: Option<Gesture>,
  pub shirt_overlay_active: bool,
  pub show_landmarks: bool,
  pub capture_pending: bool,
  pub last_captured_photo: Option<String>,
}

#[derive(Debug)]
pub struct Session {
  inventory: Arc<Inventory>,
  index: usize,
  cart: Cart,
  gesture: GestureState,
  debounce: Duration,
  metrics: FitMetrics,
  show_landmarks: bool,
  overlay_active: bool,
  camera_active: bool,
  capture_requested: bool,
  last_captured: Option<String>,
  last_capture_error: Option<String>,
}

impl Session {
  pub fn new(inventory: Arc<Inventory>) -> Self {
    Self {
      inventory,
      index: 0,
      cart: Cart::default(),
      gesture: GestureState::default(),
      debounce: DEFAULT_DEBOUNCE,
      metrics: FitMetrics::default(),
      show_landmarks: true,
      overlay_active: true,
      camera_active: false,
      capture_requested: false,
      last_captured: None,
      last_capture_error: None,
    }
  }

  pub fn with_debounce(mut self, debounce: Duration) -> Self {
    self.debounce = debounce;
    self
  }

  pub fn set_debounce(&mut self, debounce: Duration) {
    self.debounce = debounce;
  }

  pub fn inventory(&self) -> &Arc<Inventory> {
    &self.inventory
  }

  pub fn debounce(&self) -> Duration {
    self.debounce
  }

  // ---- 服装选择 ----

  /// 当前服装编号；库存为空时为 0 且没有意义
  pub fn current_index(&self) -> usize {
    self.index
  }

  pub fn current_garment(&self) -> Option<&Garment> {
    self.inventory.get(self.index)
  }

  pub fn select(&mut self, id: usize) -> Result<usize, SessionError> {
    if id >= self.inventory.len() {
      return Err(SessionError::InvalidSelection(id));
    }
    self.index = id;
    Ok(id)
  }

  pub fn next(&mut self) -> Result<usize, SessionError> {
    let len = self.inventory.len();
    if len == 0 {
      return Err(SessionError::NoGarments);
    }
    self.index = (self.index + 1) % len;
    Ok(self.index)
  }

  pub fn previous(&mut self) -> Result<usize, SessionError> {
    let len = self.inventory.len();
    if len == 0 {
      return Err(SessionError::NoGarments);
    }
    self.index = (self.index + len - 1) % len;
    Ok(self.index)
  }

  // ---- 购物车 ----

  /// 加入购物车，`id` 缺省为当前服装
  pub fn add_to_cart(&mut self, id: Option<usize>) -> Result<CartAdd, SessionError> {
    if self.inventory.is_empty() {
      return Err(SessionError::NoGarments);
    }
    let id = id.unwrap_or(self.index);
    let garment = self
      .inventory
      .get(id)
      .ok_or(SessionError::InvalidSelection(id))?;
    Ok(self.cart.add(CartItem::from_garment(garment, Local::now())))
  }

  pub fn remove_from_cart(&mut self, id: usize) {
    self.cart.remove(id);
  }

  pub fn clear_cart(&mut self) {
    self.cart.clear();
  }

  pub fn cart(&self) -> &Cart {
    &self.cart
  }

  pub fn cart_snapshot(&self) -> CartSnapshot {
    self.cart.snapshot()
  }

  // ---- 手势 ----

  /// 处理一帧识别出的手势，返回真正派发的手势
  ///
  /// 距上次派发不超过去抖窗口的手势被丢弃，不产生任何副作用。
  pub fn observe_gesture(&mut self, gesture: Gesture, now: Instant) -> Option<Gesture> {
    if gesture.is_none() {
      return None;
    }
    if self.gesture.phase(now, self.debounce) == GesturePhase::Cooldown {
      debug!("手势 {} 处于去抖窗口内，丢弃", gesture);
      return None;
    }

    self.gesture.last = Some((gesture, now));
    match gesture {
      Gesture::NextGarment => {
        if let Ok(index) = self.next() {
          info!("手势切换到下一件服装: {}", index);
        }
      }
      Gesture::PreviousGarment => {
        if let Ok(index) = self.previous() {
          info!("手势切换到上一件服装: {}", index);
        }
      }
      Gesture::AddToCart => match self.add_to_cart(None) {
        Ok(CartAdd::Added) => info!("手势将服装 {} 加入购物车", self.index),
        Ok(CartAdd::AlreadyInCart) => debug!("服装 {} 已在购物车中", self.index),
        Err(e) => debug!("手势加入购物车失败: {}", e),
      },
      Gesture::None => {}
    }
    Some(gesture)
  }

  pub fn gesture_state(&self) -> GestureState {
    self.gesture
  }

  pub fn gesture_phase(&self, now: Instant) -> GesturePhase {
    self.gesture.phase(now, self.debounce)
  }

  pub fn last_gesture(&self) -> Option<Gesture> {
    self.gesture.last.map(|(gesture, _)| gesture)
  }

  /// 去抖窗口内的最近手势，用于画面提示
  pub fn recent_gesture(&self, now: Instant) -> Option<Gesture> {
    match self.gesture.last {
      Some((gesture, at)) if now.saturating_duration_since(at) < self.debounce => Some(gesture),
      _ => None,
    }
  }

  // ---- 展示状态 ----

  pub fn update_fit_metrics(&mut self, garment_width: u32, smoothing_len: usize) {
    self.metrics = FitMetrics::derive(garment_width, smoothing_len);
  }

  pub fn fit_metrics(&self) -> FitMetrics {
    self.metrics
  }

  pub fn toggle_landmarks(&mut self) -> bool {
    self.show_landmarks = !self.show_landmarks;
    self.show_landmarks
  }

  pub fn toggle_overlay(&mut self) -> bool {
    self.overlay_active = !self.overlay_active;
    self.overlay_active
  }

  pub fn show_landmarks(&self) -> bool {
    self.show_landmarks
  }

  pub fn overlay_active(&self) -> bool {
    self.overlay_active
  }

  pub fn set_camera_active(&mut self, active: bool) {
    self.camera_active = active;
  }

  // ---- 拍照 ----

  pub fn request_capture(&mut self) {
    self.capture_requested = true;
  }

  pub fn capture_pending(&self) -> bool {
    self.capture_requested
  }

  /// 帧循环取走拍照请求
  pub fn take_capture_request(&mut self) -> bool {
    std::mem::take(&mut self.capture_requested)
  }

  pub fn record_capture(&mut self, filename: String) {
    self.last_captured = Some(filename);
    self.last_capture_error = None;
  }

  pub fn record_capture_error(&mut self, error: String) {
    self.last_capture_error = Some(error);
  }

  pub fn last_captured(&self) -> Result<&str, SessionError> {
    self.last_captured.as_deref().ok_or(SessionError::NoPhoto)
  }

  pub fn last_capture_error(&self) -> Option<&str> {
    self.last_capture_error.as_deref()
  }

  pub fn status(&self) -> SessionStatus {
    SessionStatus {
      camera_active: self.camera_active,
      current_shirt: self.index,
      fit_detection: self.metrics.fit_detection,
      tracking_quality: self.metrics.tracking_quality,
      total_shirts: self.inventory.len(),
      cart_count: self.cart.len(),
      last_gesture: self.last_gesture(),
      shirt_overlay_active: self.overlay_active,
      show_landmarks: self.show_landmarks,
      capture_pending: self.capture_requested,
      last_captured_photo: self.last_captured.clone(),
    }
  }
}

/// 帧循环与命令处理共享的会话句柄
#[derive(Debug, Clone)]
pub struct SharedSession {
  inner: Arc<Mutex<Session>>,
}

impl SharedSession {
  pub fn new(session: Session) -> Self {
    Self {
      inner: Arc::new(Mutex::new(session)),
    }
  }

  /// 加锁；某个持锁线程崩溃后仍继续使用其中的状态
  pub fn lock(&self) -> MutexGuard<'_, Session> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
    f(&mut self.lock())
  }
}
