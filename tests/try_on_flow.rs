// 该文件是 Yichu （衣橱） 项目的一部分。
// tests/try_on_flow.rs - 试衣流程集成测试
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
  path::{Path, PathBuf},
  sync::Arc,
  time::{Duration, Instant},
};

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::{Value, json};

use yichu::{
  capture::CaptureController,
  command::CommandConsole,
  config::TryOnConfig,
  gesture::Gesture,
  input::ImageFileInput,
  inventory::Inventory,
  landmark::ReplayDetector,
  output::{NullOutput, draw::Draw},
  pipeline::TryOnPipeline,
  session::{Session, SharedSession},
  task::{ContinuousTask, Task},
};

fn temp_dir(name: &str) -> PathBuf {
  let dir = std::env::temp_dir().join(format!("yichu-flow-{}-{}", name, std::process::id()));
  let _ = std::fs::remove_dir_all(&dir);
  std::fs::create_dir_all(&dir).unwrap();
  dir
}

fn three_garments(dir: &Path) -> Arc<Inventory> {
  for i in 0..3u8 {
    RgbaImage::from_pixel(10, 12, Rgba([80 * i, 40, 200, 255]))
      .save(dir.join(format!("shirt_{}.png", i)))
      .unwrap();
  }
  Arc::new(Inventory::from_directory(dir).unwrap())
}

fn point(x: f32, y: f32) -> Value {
  json!({ "x": x, "y": y, "visibility": 0.99 })
}

fn pose_json() -> Value {
  let mut points: Vec<Value> = (0..33).map(|_| point(0.5, 0.9)).collect();
  points[11] = point(0.625, 0.375);
  points[12] = point(0.375, 0.375);
  Value::Array(points)
}

fn next_hand_json() -> Value {
  let mut points: Vec<Value> = (0..21).map(|_| point(0.5, 0.5)).collect();
  points[8] = point(0.625, 0.5);
  Value::Array(points)
}

fn thumbs_up_json() -> Value {
  let mut points: Vec<Value> = (0..21).map(|_| point(0.5, 0.5)).collect();
  points[4] = point(0.5, 0.375);
  points[8] = point(0.5, 0.5625);
  Value::Array(points)
}

#[test]
fn test_next_twice_then_add_to_cart() {
  let dir = temp_dir("session");
  let mut session = Session::new(three_garments(&dir));
  let t0 = Instant::now();

  session.observe_gesture(Gesture::NextGarment, t0);
  session.observe_gesture(Gesture::NextGarment, t0 + Duration::from_secs(2));
  session.observe_gesture(Gesture::AddToCart, t0 + Duration::from_secs(4));

  assert_eq!(session.current_index(), 2);
  let cart = session.cart_snapshot();
  assert_eq!(cart.count, 1);
  assert_eq!(cart.items[0].id, 2);
  assert!((cart.items[0].price - 39.99).abs() < 1e-9);
  assert!((cart.total - 39.99).abs() < 1e-9);
}

#[test]
fn test_continuous_task_over_replayed_landmarks() {
  let dir = temp_dir("task");
  let inventory = three_garments(&dir);
  // 窗口足够长，帧处理的快慢不影响结果
  let config = TryOnConfig::default()
    .with_mirror(false)
    .with_debounce(Duration::from_secs(60));
  let session = SharedSession::new(Session::new(inventory));
  let capture = CaptureController::new(dir.join("captures"));
  session.with(|s| s.request_capture());

  let lines = [
    json!({ "pose": pose_json(), "hands": [next_hand_json()] }),
    json!({ "pose": pose_json() }),
    // 紧跟在上一个手势之后，会被去抖丢弃
    json!({ "pose": null, "hands": [thumbs_up_json()] }),
  ]
  .iter()
  .map(Value::to_string)
  .collect::<Vec<_>>()
  .join("\n");
  let detector = ReplayDetector::from_reader(lines.as_bytes()).unwrap();
  let input = ImageFileInput::new(RgbImage::from_pixel(1024, 1024, Rgb([30, 30, 30])), 5);

  let pipeline = TryOnPipeline::new(&config, session.clone(), capture, Draw::default());
  ContinuousTask::new(pipeline)
    .with_interrupt(false)
    .with_frame_number(Some(4))
    .run_task(input, detector, NullOutput)
    .unwrap();

  let s = session.lock();
  assert_eq!(s.current_index(), 1);
  assert!(s.cart().is_empty());
  assert_eq!(s.last_gesture(), Some(Gesture::NextGarment));
  // 肩宽 256 像素: 256 * 262 / 190 = 353, 353 % 15 = 8；平滑窗口 2 帧
  let metrics = s.fit_metrics();
  assert_eq!((metrics.fit_detection, metrics.tracking_quality), (93, 88));

  let status = s.status();
  assert!(!status.camera_active);
  assert!(!status.capture_pending);
  let photo = status.last_captured_photo.unwrap();
  assert!(dir.join("captures").join(photo).is_file());
}

#[test]
fn test_console_drives_shared_session() {
  let dir = temp_dir("console");
  let session = SharedSession::new(Session::new(three_garments(&dir)));
  let console = CommandConsole::new(session.clone(), CaptureController::new(dir.join("photos")));

  let mut output = Vec::new();
  console
    .run("select 2\ncart add\ncart add 0\ncart\n".as_bytes(), &mut output)
    .unwrap();
  let responses: Vec<Value> = String::from_utf8(output)
    .unwrap()
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();

  assert_eq!(responses[0]["current_shirt"], 2);
  assert_eq!(responses[3]["count"], 2);
  assert_eq!(session.lock().cart().len(), 2);
}
