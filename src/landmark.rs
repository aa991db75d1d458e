// 该文件是 Yichu （衣橱） 项目的一部分。
// src/landmark.rs - 人体与手部关键点
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

//! 关键点检测器是外部能力，本模块只定义它的输出形状。
//!
//! 检测器按固定顺序给出 33 个人体关键点和每只手 21 个关键点，
//! 这个顺序只在本模块里出现；其余代码一律通过 [`PoseJoint`] 和
//! [`HandJoint`] 按名字取点。

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame};

pub const POSE_JOINT_COUNT: usize = 33;
pub const HAND_JOINT_COUNT: usize = 21;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 归一化坐标点，x/y 相对于画面宽高，取值 [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LandmarkPoint {
  pub x: f32,
  pub y: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub visibility: Option<f32>,
}

impl LandmarkPoint {
  pub fn new(x: f32, y: f32) -> Self {
    Self {
      x,
      y,
      visibility: None,
    }
  }

  pub fn with_visibility(mut self, visibility: f32) -> Self {
    self.visibility = Some(visibility);
    self
  }

  /// 转换到像素坐标（向零截断）
  pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
    (
      (self.x * width as f32) as i32,
      (self.y * height as f32) as i32,
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseJoint {
  Nose,
  LeftEyeInner,
  LeftEye,
  LeftEyeOuter,
  RightEyeInner,
  RightEye,
  RightEyeOuter,
  LeftEar,
  RightEar,
  MouthLeft,
  MouthRight,
  LeftShoulder,
  RightShoulder,
  LeftElbow,
  RightElbow,
  LeftWrist,
  RightWrist,
  LeftPinky,
  RightPinky,
  LeftIndex,
  RightIndex,
  LeftThumb,
  RightThumb,
  LeftHip,
  RightHip,
  LeftKnee,
  RightKnee,
  LeftAnkle,
  RightAnkle,
  LeftHeel,
  RightHeel,
  LeftFootIndex,
  RightFootIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandJoint {
  Wrist,
  ThumbCmc,
  ThumbMcp,
  ThumbIp,
  ThumbTip,
  IndexMcp,
  IndexPip,
  IndexDip,
  IndexTip,
  MiddleMcp,
  MiddlePip,
  MiddleDip,
  MiddleTip,
  RingMcp,
  RingPip,
  RingDip,
  RingTip,
  PinkyMcp,
  PinkyPip,
  PinkyDip,
  PinkyTip,
}

// 检测器输出顺序即枚举声明顺序
impl PoseJoint {
  fn index(self) -> usize {
    self as usize
  }
}

impl HandJoint {
  fn index(self) -> usize {
    self as usize
  }
}

/// 绘制人体骨架时连接的关键点对
pub const POSE_CONNECTIONS: &[(PoseJoint, PoseJoint)] = &[
  (PoseJoint::Nose, PoseJoint::LeftEyeInner),
  (PoseJoint::LeftEyeInner, PoseJoint::LeftEye),
  (PoseJoint::LeftEye, PoseJoint::LeftEyeOuter),
  (PoseJoint::LeftEyeOuter, PoseJoint::LeftEar),
  (PoseJoint::Nose, PoseJoint::RightEyeInner),
  (PoseJoint::RightEyeInner, PoseJoint::RightEye),
  (PoseJoint::RightEye, PoseJoint::RightEyeOuter),
  (PoseJoint::RightEyeOuter, PoseJoint::RightEar),
  (PoseJoint::MouthLeft, PoseJoint::MouthRight),
  (PoseJoint::LeftShoulder, PoseJoint::RightShoulder),
  (PoseJoint::LeftShoulder, PoseJoint::LeftElbow),
  (PoseJoint::LeftElbow, PoseJoint::LeftWrist),
  (PoseJoint::LeftWrist, PoseJoint::LeftPinky),
  (PoseJoint::LeftWrist, PoseJoint::LeftIndex),
  (PoseJoint::LeftWrist, PoseJoint::LeftThumb),
  (PoseJoint::LeftPinky, PoseJoint::LeftIndex),
  (PoseJoint::RightShoulder, PoseJoint::RightElbow),
  (PoseJoint::RightElbow, PoseJoint::RightWrist),
  (PoseJoint::RightWrist, PoseJoint::RightPinky),
  (PoseJoint::RightWrist, PoseJoint::RightIndex),
  (PoseJoint::RightWrist, PoseJoint::RightThumb),
  (PoseJoint::RightPinky, PoseJoint::RightIndex),
  (PoseJoint::LeftShoulder, PoseJoint::LeftHip),
  (PoseJoint::RightShoulder, PoseJoint::RightHip),
  (PoseJoint::LeftHip, PoseJoint::RightHip),
  (PoseJoint::LeftHip, PoseJoint::LeftKnee),
  (PoseJoint::LeftKnee, PoseJoint::LeftAnkle),
  (PoseJoint::LeftAnkle, PoseJoint::LeftHeel),
  (PoseJoint::LeftHeel, PoseJoint::LeftFootIndex),
  (PoseJoint::LeftAnkle, PoseJoint::LeftFootIndex),
  (PoseJoint::RightHip, PoseJoint::RightKnee),
  (PoseJoint::RightKnee, PoseJoint::RightAnkle),
  (PoseJoint::RightAnkle, PoseJoint::RightHeel),
  (PoseJoint::RightHeel, PoseJoint::RightFootIndex),
  (PoseJoint::RightAnkle, PoseJoint::RightFootIndex),
];

#[derive(Debug, Clone, PartialEq)]
pub struct PoseLandmarks {
  points: [LandmarkPoint; POSE_JOINT_COUNT],
}

impl PoseLandmarks {
  /// 按检测器顺序构造，点数不符返回 None
  pub fn from_ordered(points: &[LandmarkPoint]) -> Option<Self> {
    let points: [LandmarkPoint; POSE_JOINT_COUNT] = points.try_into().ok()?;
    Some(Self { points })
  }

  /// 所有关键点落在同一处，测试与回放时用来只设置关心的几个点
  pub fn filled(point: LandmarkPoint) -> Self {
    Self {
      points: [point; POSE_JOINT_COUNT],
    }
  }

  pub fn joint(&self, joint: PoseJoint) -> LandmarkPoint {
    self.points[joint.index()]
  }

  pub fn set_joint(&mut self, joint: PoseJoint, point: LandmarkPoint) {
    self.points[joint.index()] = point;
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
  points: [LandmarkPoint; HAND_JOINT_COUNT],
}

impl HandLandmarks {
  pub fn from_ordered(points: &[LandmarkPoint]) -> Option<Self> {
    let points: [LandmarkPoint; HAND_JOINT_COUNT] = points.try_into().ok()?;
    Some(Self { points })
  }

  pub fn filled(point: LandmarkPoint) -> Self {
    Self {
      points: [point; HAND_JOINT_COUNT],
    }
  }

  pub fn joint(&self, joint: HandJoint) -> LandmarkPoint {
    self.points[joint.index()]
  }

  pub fn set_joint(&mut self, joint: HandJoint, point: LandmarkPoint) {
    self.points[joint.index()] = point;
  }
}

/// 一帧的检测结果：至多一个人体，任意只手
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Landmarks {
  pub pose: Option<PoseLandmarks>,
  pub hands: Vec<HandLandmarks>,
}

impl Landmarks {
  pub fn is_empty(&self) -> bool {
    self.pose.is_none() && self.hands.is_empty()
  }
}

mod replay;
pub use self::replay::{ReplayDetector, ReplayDetectorError};

/// 不做检测，始终返回空结果；用于只推流不试衣的场景
#[derive(Debug, Default)]
pub struct NoDetector;

impl FromUrlWithScheme for NoDetector {
  const SCHEME: &'static str = "none";
}

impl FromUrl for NoDetector {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::SchemeMismatch);
    }
    Ok(NoDetector)
  }
}

impl Model for NoDetector {
  type Input = RgbFrame;
  type Output = Landmarks;
  type Error = DetectorError;

  fn infer(&self, _input: &RgbFrame) -> Result<Landmarks, Self::Error> {
    Ok(Landmarks::default())
  }
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("回放检测器错误: {0}")]
  ReplayDetectorError(#[from] ReplayDetectorError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum DetectorWrapper {
  Replay(ReplayDetector),
  None(NoDetector),
}

impl FromUrl for DetectorWrapper {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ReplayDetector::SCHEME => Ok(DetectorWrapper::Replay(ReplayDetector::from_url(url)?)),
      NoDetector::SCHEME => Ok(DetectorWrapper::None(NoDetector)),
      _ => Err(DetectorError::SchemeMismatch),
    }
  }
}

impl Model for DetectorWrapper {
  type Input = RgbFrame;
  type Output = Landmarks;
  type Error = DetectorError;

  fn infer(&self, input: &RgbFrame) -> Result<Landmarks, Self::Error> {
    match self {
      DetectorWrapper::Replay(detector) => detector.infer(input).map_err(DetectorError::from),
      DetectorWrapper::None(detector) => detector.infer(input),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_to_pixel_truncates() {
    let point = LandmarkPoint::new(0.5, 0.251);
    assert_eq!(point.to_pixel(641, 480), (320, 120));
  }

  #[test]
  fn test_pose_from_ordered_maps_named_joints() {
    let points: Vec<LandmarkPoint> = (0..POSE_JOINT_COUNT)
      .map(|i| LandmarkPoint::new(i as f32 / 100.0, 0.0))
      .collect();
    let pose = PoseLandmarks::from_ordered(&points).unwrap();
    assert_eq!(pose.joint(PoseJoint::LeftShoulder).x, 0.11);
    assert_eq!(pose.joint(PoseJoint::RightShoulder).x, 0.12);
    assert!(PoseLandmarks::from_ordered(&points[..20]).is_none());
  }

  #[test]
  fn test_hand_from_ordered_maps_named_joints() {
    let points: Vec<LandmarkPoint> = (0..HAND_JOINT_COUNT)
      .map(|i| LandmarkPoint::new(0.0, i as f32))
      .collect();
    let hand = HandLandmarks::from_ordered(&points).unwrap();
    assert_eq!(hand.joint(HandJoint::Wrist).y, 0.0);
    assert_eq!(hand.joint(HandJoint::ThumbMcp).y, 2.0);
    assert_eq!(hand.joint(HandJoint::ThumbTip).y, 4.0);
    assert_eq!(hand.joint(HandJoint::IndexMcp).y, 5.0);
    assert_eq!(hand.joint(HandJoint::IndexTip).y, 8.0);
  }

  #[test]
  fn test_wrapper_rejects_unknown_scheme() {
    let url = Url::parse("onnx:///models/pose.onnx").unwrap();
    assert!(matches!(
      DetectorWrapper::from_url(&url),
      Err(DetectorError::SchemeMismatch)
    ));
  }
}
