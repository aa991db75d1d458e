// 该文件是 Yichu （衣橱） 项目的一部分。
// src/pipeline.rs - 单帧试衣流水线
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

//! 每帧的处理顺序：平滑肩部 → 合成服装 → 绘制骨架 → 手势分类并更新会话
//! → 拍照 → 界面提示。镜像在检测之前由调用方通过 [`TryOnPipeline::prepare`] 完成。

use std::{sync::Arc, time::Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
  capture::CaptureController,
  compositor::{GarmentPlacement, composite_garment},
  config::TryOnConfig,
  frame::RgbFrame,
  gesture::{Gesture, GestureClassifier},
  inventory::{Inventory, SpriteCache},
  landmark::{Landmarks, PoseJoint, PoseLandmarks},
  output::draw::{Draw, UiOverlay},
  session::SharedSession,
  smoother::{LandmarkSmoother, PixelPoint, ShoulderPair, SmoothedAnchor},
};

/// 一帧处理的摘要，供输出端记录
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
  pub frame_index: u64,
  pub timestamp_ms: u64,
  pub pose_detected: bool,
  pub anchor: Option<SmoothedAnchor>,
  pub garment: Option<usize>,
  pub placement: Option<GarmentPlacement>,
  /// 本帧每只手的识别结果
  pub gestures: Vec<Gesture>,
  /// 通过去抖后真正生效的手势
  pub dispatched: Vec<Gesture>,
  pub captured: Option<String>,
  pub capture_error: Option<String>,
}

impl FrameReport {
  /// 本帧是否有值得记录的内容
  pub fn is_notable(&self) -> bool {
    self.pose_detected
      || !self.dispatched.is_empty()
      || self.captured.is_some()
      || self.capture_error.is_some()
  }
}

fn shoulders(pose: &PoseLandmarks, width: u32, height: u32) -> ShoulderPair {
  let pixel = |joint| {
    let (x, y) = pose.joint(joint).to_pixel(width, height);
    PixelPoint::new(x as f32, y as f32)
  };
  ShoulderPair::new(pixel(PoseJoint::LeftShoulder), pixel(PoseJoint::RightShoulder))
}

pub struct TryOnPipeline {
  session: SharedSession,
  inventory: Arc<Inventory>,
  smoother: LandmarkSmoother,
  classifier: GestureClassifier,
  sprites: SpriteCache,
  capture: CaptureController,
  draw: Draw,
  mirror: bool,
}

impl TryOnPipeline {
  pub fn new(
    config: &TryOnConfig,
    session: SharedSession,
    capture: CaptureController,
    draw: Draw,
  ) -> Self {
    // 去抖间隔以配置为准
    let inventory = session.with(|s| {
      s.set_debounce(config.debounce);
      s.inventory().clone()
    });
    Self {
      session,
      inventory,
      smoother: LandmarkSmoother::new(config.smoothing_window),
      classifier: GestureClassifier::new(config.gesture),
      sprites: SpriteCache::default(),
      capture,
      draw,
      mirror: config.mirror,
    }
  }

  pub fn session(&self) -> &SharedSession {
    &self.session
  }

  pub fn smoother(&self) -> &LandmarkSmoother {
    &self.smoother
  }

  /// 检测前的预处理：按配置水平镜像
  pub fn prepare(&self, frame: &mut RgbFrame) {
    if self.mirror {
      frame.mirror();
    }
  }

  pub fn process(&mut self, frame: &mut RgbFrame, landmarks: &Landmarks, now: Instant) -> FrameReport {
    let (width, height) = (frame.width(), frame.height());
    let mut report = FrameReport {
      frame_index: frame.index(),
      timestamp_ms: frame.timestamp_ms(),
      pose_detected: landmarks.pose.is_some(),
      ..Default::default()
    };

    let (overlay_active, show_landmarks, garment) = self.session.with(|s| {
      (
        s.overlay_active(),
        s.show_landmarks(),
        s.current_garment().map(|g| g.id),
      )
    });

    if overlay_active && let Some(pose) = &landmarks.pose {
      let anchor = self.smoother.push(shoulders(pose, width, height));
      report.anchor = Some(anchor);

      if let Some(id) = garment {
        report.garment = Some(id);
        match self.sprites.get_or_load(&self.inventory, id) {
          Ok(sprite) => {
            report.placement = composite_garment(frame.image_mut(), sprite, &anchor);
          }
          Err(e) => warn!("服装 {} 贴图加载失败，本帧跳过: {}", id, e),
        }
      }

      if show_landmarks {
        self.draw.draw_pose(frame.image_mut(), pose);
      }
    }

    report.gestures = landmarks
      .hands
      .iter()
      .map(|hand| self.classifier.classify(hand, width, height))
      .collect();

    let smoothing_len = self.smoother.len();
    let (capture_requested, garment_name) = self.session.with(|s| {
      if let Some(placement) = &report.placement {
        s.update_fit_metrics(placement.width, smoothing_len);
      }
      for &gesture in &report.gestures {
        if let Some(dispatched) = s.observe_gesture(gesture, now) {
          report.dispatched.push(dispatched);
        }
      }
      (
        s.take_capture_request(),
        s.current_garment().map(|g| g.name.clone()),
      )
    });

    for gesture in &report.dispatched {
      info!("第 {} 帧派发手势: {}", report.frame_index, gesture);
    }

    // 拍照涉及文件写入，不持有会话锁
    if capture_requested {
      match self.capture.capture(frame.image(), garment_name.as_deref()) {
        Ok(photo) => {
          self.session.with(|s| s.record_capture(photo.filename.clone()));
          report.captured = Some(photo.filename);
        }
        Err(e) => {
          error!("拍照失败: {}", e);
          let message = e.to_string();
          self.session.with(|s| s.record_capture_error(message.clone()));
          report.capture_error = Some(message);
        }
      }
    }

    let overlay = self.session.with(|s| UiOverlay {
      gesture: s.recent_gesture(now),
      garment_position: (!s.inventory().is_empty())
        .then(|| (s.current_index(), s.inventory().len())),
      cart_count: s.cart().len(),
    });
    self.draw.draw_ui_overlay(frame.image_mut(), &overlay);

    debug!(
      "第 {} 帧: 人体={} 摆放={:?}",
      report.frame_index, report.pose_detected, report.placement
    );
    report
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use image::{Rgb, RgbImage, Rgba, RgbaImage};

  use super::*;
  use crate::{
    landmark::{HandJoint, HandLandmarks, LandmarkPoint},
    session::Session,
  };

  const SIZE: u32 = 1024;

  fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("yichu-pipeline-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  /// 三件纯色服装的库存
  fn pipeline(name: &str) -> (TryOnPipeline, std::path::PathBuf) {
    let dir = temp_dir(name);
    for (i, color) in [[255, 0, 0], [0, 255, 0], [0, 0, 255]].iter().enumerate() {
      RgbaImage::from_pixel(49, 59, Rgba([color[0], color[1], color[2], 255]))
        .save(dir.join(format!("shirt_{}.png", i)))
        .unwrap();
    }
    let inventory = Arc::new(Inventory::from_directory(&dir).unwrap());
    let config = TryOnConfig::default().with_mirror(false);
    let session = SharedSession::new(Session::new(inventory).with_debounce(config.debounce));
    let capture = CaptureController::new(dir.join("captures"));
    let pipeline = TryOnPipeline::new(&config, session, capture, Draw::default());
    (pipeline, dir)
  }

  fn frame() -> RgbFrame {
    RgbFrame::new(RgbImage::from_pixel(SIZE, SIZE, Rgb([10, 10, 10])), 0, 0)
  }

  /// 肩宽 190 像素，位于画面中部
  fn pose() -> PoseLandmarks {
    let mut pose = PoseLandmarks::filled(LandmarkPoint::new(0.5, 0.9));
    pose.set_joint(PoseJoint::LeftShoulder, LandmarkPoint::new(587.0 / 1024.0, 0.375));
    pose.set_joint(PoseJoint::RightShoulder, LandmarkPoint::new(397.0 / 1024.0, 0.375));
    pose
  }

  fn next_hand() -> HandLandmarks {
    let mut hand = HandLandmarks::filled(LandmarkPoint::new(0.5, 0.5));
    hand.set_joint(HandJoint::Wrist, LandmarkPoint::new(0.5, 0.5));
    hand.set_joint(HandJoint::IndexTip, LandmarkPoint::new(0.5 + 100.0 / 1024.0, 0.5));
    hand
  }

  #[test]
  fn test_no_pose_skips_compositing() {
    let (mut pipeline, _dir) = pipeline("nopose");
    let mut frame = frame();
    let report = pipeline.process(&mut frame, &Landmarks::default(), Instant::now());
    assert!(!report.pose_detected);
    assert!(report.placement.is_none());
    assert_eq!(*frame.image().get_pixel(400, 400), Rgb([10, 10, 10]));
    assert_eq!(pipeline.session().lock().fit_metrics().fit_detection, 85);
  }

  #[test]
  fn test_pose_composites_current_garment() {
    let (mut pipeline, _dir) = pipeline("pose");
    pipeline.session().with(|s| s.toggle_landmarks());
    let mut frame = frame();
    let landmarks = Landmarks {
      pose: Some(pose()),
      hands: vec![],
    };
    let report = pipeline.process(&mut frame, &landmarks, Instant::now());

    let placement = report.placement.unwrap();
    assert_eq!(
      (placement.x, placement.y, placement.width, placement.height),
      (358, 321, 262, 316)
    );
    assert_eq!(report.garment, Some(0));
    assert_eq!(*frame.image().get_pixel(400, 400), Rgb([255, 0, 0]));
    assert_eq!(*frame.image().get_pixel(100, 100), Rgb([10, 10, 10]));
    // 262 % 15 = 7，平滑窗口内 1 帧
    let metrics = pipeline.session().lock().fit_metrics();
    assert_eq!((metrics.fit_detection, metrics.tracking_quality), (92, 84));
  }

  #[test]
  fn test_overlay_inactive_leaves_frame() {
    let (mut pipeline, _dir) = pipeline("inactive");
    pipeline.session().with(|s| s.toggle_overlay());
    let mut frame = frame();
    let landmarks = Landmarks {
      pose: Some(pose()),
      hands: vec![],
    };
    let report = pipeline.process(&mut frame, &landmarks, Instant::now());
    assert!(report.placement.is_none());
    assert!(pipeline.smoother().is_empty());
    assert_eq!(*frame.image().get_pixel(400, 400), Rgb([10, 10, 10]));
  }

  #[test]
  fn test_gesture_switches_garment_with_debounce() {
    let (mut pipeline, _dir) = pipeline("gesture");
    let landmarks = Landmarks {
      pose: None,
      hands: vec![next_hand()],
    };
    let t0 = Instant::now();

    let report = pipeline.process(&mut frame(), &landmarks, t0);
    assert_eq!(report.gestures, vec![Gesture::NextGarment]);
    assert_eq!(report.dispatched, vec![Gesture::NextGarment]);

    let report = pipeline.process(&mut frame(), &landmarks, t0 + Duration::from_millis(500));
    assert!(report.dispatched.is_empty());

    pipeline.process(&mut frame(), &landmarks, t0 + Duration::from_secs(2));
    assert_eq!(pipeline.session().lock().current_index(), 2);
  }

  #[test]
  fn test_config_debounce_applies_to_session() {
    let dir = temp_dir("debounce");
    let inventory = Arc::new(Inventory::from_filenames(&dir, ["a.png", "b.png"]));
    let session = SharedSession::new(Session::new(inventory).with_debounce(Duration::from_secs(60)));
    let config = TryOnConfig::default()
      .with_mirror(false)
      .with_debounce(Duration::from_millis(200));
    let mut pipeline = TryOnPipeline::new(
      &config,
      session.clone(),
      CaptureController::new(dir.join("captures")),
      Draw::default(),
    );
    assert_eq!(session.lock().debounce(), Duration::from_millis(200));

    let landmarks = Landmarks {
      pose: None,
      hands: vec![next_hand()],
    };
    let t0 = Instant::now();
    pipeline.process(&mut frame(), &landmarks, t0);
    let report = pipeline.process(&mut frame(), &landmarks, t0 + Duration::from_millis(300));
    assert_eq!(report.dispatched, vec![Gesture::NextGarment]);
    assert_eq!(session.lock().current_index(), 0);
  }

  #[test]
  fn test_capture_request_is_served_next_frame() {
    let (mut pipeline, dir) = pipeline("capture");
    pipeline.session().with(|s| s.request_capture());
    let report = pipeline.process(&mut frame(), &Landmarks::default(), Instant::now());

    let filename = report.captured.unwrap();
    assert!(filename.starts_with("virtual_tryout_"));
    assert!(dir.join("captures").join(&filename).is_file());
    let session = pipeline.session().lock();
    assert!(!session.capture_pending());
    assert_eq!(session.last_captured(), Ok(filename.as_str()));
  }

  #[test]
  fn test_missing_sprite_skips_frame_only() {
    let (mut pipeline, dir) = pipeline("missing");
    std::fs::remove_file(dir.join("shirt_0.png")).unwrap();
    let landmarks = Landmarks {
      pose: Some(pose()),
      hands: vec![],
    };
    let report = pipeline.process(&mut frame(), &landmarks, Instant::now());
    assert!(report.anchor.is_some());
    assert!(report.placement.is_none());
    assert_eq!(pipeline.smoother().len(), 1);
  }
}
