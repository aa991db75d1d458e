// 该文件是 Yichu （衣橱） 项目的一部分。
// src/landmark/replay.rs - 关键点回放检测器
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

//! 从 JSON Lines 文件回放外部检测器的输出，每行对应一帧：
//!
//! ```json
//! {"pose": [{"x": 0.4, "y": 0.3, "visibility": 0.9}, ...], "hands": [[{"x": 0.5, "y": 0.5}, ...]]}
//! ```
//!
//! `pose` 为 33 个点或 `null`，`hands` 中每只手 21 个点。
//! URL 形如 `replay:///path/to/landmarks.jsonl?loop=true`。

use std::{
  io::{BufRead, BufReader},
  sync::atomic::{AtomicUsize, Ordering},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use super::{HandLandmarks, LandmarkPoint, Landmarks, Model, PoseLandmarks};
use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame};

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("第 {line} 行解析失败: {source}")]
  ParseError {
    line: usize,
    source: serde_json::Error,
  },
  #[error("第 {line} 行关键点数量错误: {count}")]
  JointCountMismatch { line: usize, count: usize },
}

#[derive(Debug, Deserialize)]
struct ReplayPoint {
  x: f32,
  y: f32,
  #[serde(default)]
  visibility: Option<f32>,
}

impl From<&ReplayPoint> for LandmarkPoint {
  fn from(point: &ReplayPoint) -> Self {
    LandmarkPoint {
      x: point.x,
      y: point.y,
      visibility: point.visibility,
    }
  }
}

#[derive(Debug, Deserialize)]
struct ReplayRecord {
  #[serde(default)]
  pose: Option<Vec<ReplayPoint>>,
  #[serde(default)]
  hands: Vec<Vec<ReplayPoint>>,
}

pub struct ReplayDetector {
  records: Vec<Landmarks>,
  cursor: AtomicUsize,
  looping: bool,
}

impl FromUrlWithScheme for ReplayDetector {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetector {
  type Error = ReplayDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayDetectorError::SchemeMismatch);
    }

    let looping = url
      .query_pairs()
      .any(|(k, v)| k == "loop" && (v == "true" || v == "1"));

    let file = std::fs::File::open(crate::url_path(url))?;
    let detector = Self::from_reader(BufReader::new(file))?.with_looping(looping);
    info!(
      "回放检测器已加载 {} 帧关键点（循环: {}）",
      detector.records.len(),
      detector.looping
    );
    Ok(detector)
  }
}

impl ReplayDetector {
  pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ReplayDetectorError> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      let record: ReplayRecord =
        serde_json::from_str(&line).map_err(|source| ReplayDetectorError::ParseError {
          line: idx + 1,
          source,
        })?;
      records.push(Self::convert(idx + 1, &record)?);
    }

    Ok(Self {
      records,
      cursor: AtomicUsize::new(0),
      looping: false,
    })
  }

  pub fn with_looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  fn convert(line: usize, record: &ReplayRecord) -> Result<Landmarks, ReplayDetectorError> {
    let points = |raw: &[ReplayPoint]| raw.iter().map(LandmarkPoint::from).collect::<Vec<_>>();

    let pose = match &record.pose {
      Some(raw) => Some(PoseLandmarks::from_ordered(&points(raw)).ok_or(
        ReplayDetectorError::JointCountMismatch {
          line,
          count: raw.len(),
        },
      )?),
      None => None,
    };

    let hands = record
      .hands
      .iter()
      .map(|raw| {
        HandLandmarks::from_ordered(&points(raw)).ok_or(ReplayDetectorError::JointCountMismatch {
          line,
          count: raw.len(),
        })
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Landmarks { pose, hands })
  }
}

impl Model for ReplayDetector {
  type Input = RgbFrame;
  type Output = Landmarks;
  type Error = ReplayDetectorError;

  fn infer(&self, _input: &RgbFrame) -> Result<Landmarks, Self::Error> {
    if self.records.is_empty() {
      return Ok(Landmarks::default());
    }

    let position = self.cursor.fetch_add(1, Ordering::Relaxed);
    let index = if self.looping {
      position % self.records.len()
    } else {
      position
    };

    match self.records.get(index) {
      Some(landmarks) => Ok(landmarks.clone()),
      None => {
        if index == self.records.len() {
          warn!("关键点回放已结束，后续帧按未检测到处理");
        }
        Ok(Landmarks::default())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::landmark::{HandJoint, PoseJoint};

  fn pose_line(shoulder_x: f32) -> String {
    let points: Vec<String> = (0..33)
      .map(|i| {
        let x = if i == 11 { shoulder_x } else { 0.5 };
        format!("{{\"x\": {}, \"y\": 0.3}}", x)
      })
      .collect();
    format!("{{\"pose\": [{}]}}", points.join(","))
  }

  fn hand_line() -> String {
    let points: Vec<String> = (0..21)
      .map(|i| format!("{{\"x\": 0.1, \"y\": {}}}", i as f32 / 100.0))
      .collect();
    format!("{{\"pose\": null, \"hands\": [[{}]]}}", points.join(","))
  }

  fn frame() -> RgbFrame {
    RgbFrame::from_rgb_bytes(1, 1, vec![0; 3], 0, 0).unwrap()
  }

  #[test]
  fn test_replay_in_order_then_empty() {
    let text = format!("{}\n\n{}\n", pose_line(0.25), hand_line());
    let detector = ReplayDetector::from_reader(text.as_bytes()).unwrap();
    assert_eq!(detector.len(), 2);

    let first = detector.infer(&frame()).unwrap();
    let pose = first.pose.unwrap();
    assert_eq!(pose.joint(PoseJoint::LeftShoulder).x, 0.25);
    assert_eq!(pose.joint(PoseJoint::RightShoulder).x, 0.5);

    let second = detector.infer(&frame()).unwrap();
    assert!(second.pose.is_none());
    assert_eq!(second.hands.len(), 1);
    assert_eq!(second.hands[0].joint(HandJoint::IndexTip).y, 0.08);

    assert!(detector.infer(&frame()).unwrap().is_empty());
  }

  #[test]
  fn test_replay_loops_when_requested() {
    let text = pose_line(0.4);
    let detector = ReplayDetector::from_reader(text.as_bytes())
      .unwrap()
      .with_looping(true);
    for _ in 0..3 {
      assert!(detector.infer(&frame()).unwrap().pose.is_some());
    }
  }

  #[test]
  fn test_replay_rejects_short_pose() {
    let text = "{\"pose\": [{\"x\": 0.1, \"y\": 0.2}]}";
    assert!(matches!(
      ReplayDetector::from_reader(text.as_bytes()),
      Err(ReplayDetectorError::JointCountMismatch { line: 1, count: 1 })
    ));
  }
}
