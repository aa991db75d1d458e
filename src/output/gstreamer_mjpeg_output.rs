// 该文件是 Yichu （衣橱） 项目的一部分。
// src/output/gstreamer_mjpeg_output.rs - GStreamer MJPEG 推流输出
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

//! 把合成后的画面编码为 JPEG，以 `multipart/x-mixed-replace; boundary=frame`
//! 的形式通过 TCP 推给浏览器：
//!
//! `mjpeg://0.0.0.0?port=5000&width=640&height=480&fps=30&quality=85`

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, output::Render, pipeline::FrameReport};

pub const MJPEG_BOUNDARY: &str = "frame";

#[derive(Error, Debug)]
pub enum GStreamerMjpegOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 操作错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("找不到 appsrc 元素")]
  AppSrcNotFound,
  #[error("无法转换为 appsrc")]
  AppSrcConversionFailed,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("状态切换错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("无法创建缓冲区")]
  BufferCreationError,
  #[error("帧尺寸 {actual:?} 与推流尺寸 {expected:?} 不一致")]
  FrameSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

/// 推流参数，均来自 URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MjpegStreamConfig {
  pub host: String,
  pub port: u16,
  pub width: u32,
  pub height: u32,
  pub fps: u32,
  pub quality: u32,
}

impl MjpegStreamConfig {
  fn from_url(url: &Url) -> Self {
    let query: HashMap<_, _> = url.query_pairs().collect();
    let number = |key: &str, default: u32| {
      query
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
    };

    Self {
      host: url.host_str().unwrap_or("0.0.0.0").to_string(),
      port: query
        .get("port")
        .and_then(|v| v.parse().ok())
        .unwrap_or(5000),
      width: number("width", 640),
      height: number("height", 480),
      fps: number("fps", 30).max(1),
      quality: number("quality", 85).min(100),
    }
  }

  pub fn pipeline_description(&self) -> String {
    format!(
      "appsrc name=src ! videoconvert ! jpegenc quality={} ! \
       multipartmux boundary={} ! tcpserversink host={} port={}",
      self.quality, MJPEG_BOUNDARY, self.host, self.port
    )
  }
}

pub struct GStreamerMjpegOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  config: MjpegStreamConfig,
  frame_count: Mutex<u64>,
}

impl FromUrlWithScheme for GStreamerMjpegOutput {
  const SCHEME: &'static str = "mjpeg";
}

impl FromUrl for GStreamerMjpegOutput {
  type Error = GStreamerMjpegOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerMjpegOutputError::SchemeMismatch);
    }

    gst::init()?;

    let config = MjpegStreamConfig::from_url(url);
    let description = config.pipeline_description();
    info!("创建 MJPEG 推流管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerMjpegOutputError::PipelineError("无法创建管道".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerMjpegOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerMjpegOutputError::AppSrcConversionFailed)?;

    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", config.width as i32)
      .field("height", config.height as i32)
      .field("framerate", gst::Fraction::new(config.fps as i32, 1))
      .build();
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);
    appsrc.set_property("is-live", true);

    pipeline.set_state(gst::State::Playing)?;
    info!(
      "MJPEG 推流已启动: http://{}:{} ({}x{} @ {} fps)",
      config.host, config.port, config.width, config.height, config.fps
    );

    Ok(GStreamerMjpegOutput {
      pipeline,
      appsrc,
      config,
      frame_count: Mutex::new(0),
    })
  }
}

impl Drop for GStreamerMjpegOutput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 MJPEG 推流管道失败: {}", e);
    }
    let frame_count = self.frame_count.lock().unwrap_or_else(PoisonError::into_inner);
    info!("MJPEG 推流结束，共推送 {} 帧", *frame_count);
  }
}

impl GStreamerMjpegOutput {
  fn push_frame(&self, data: &[u8]) -> Result<(), GStreamerMjpegOutputError> {
    let mut buffer =
      gst::Buffer::with_size(data.len()).map_err(|_| GStreamerMjpegOutputError::BufferCreationError)?;

    let fps = self.config.fps as u64;
    let mut frame_count = self.frame_count.lock().unwrap_or_else(PoisonError::into_inner);
    let timestamp = *frame_count * 1_000_000_000 / fps;
    *frame_count += 1;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerMjpegOutputError::BufferCreationError)?;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(timestamp));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(1_000_000_000 / fps));
      let mut map = buffer_ref
        .map_writable()
        .map_err(|_| GStreamerMjpegOutputError::PipelineError("无法映射缓冲区".to_string()))?;
      map.copy_from_slice(data);
    }

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerMjpegOutputError::PipelineError(format!("推送缓冲区失败: {:?}", e))
    })?;
    Ok(())
  }
}

impl Render<RgbFrame, FrameReport> for GStreamerMjpegOutput {
  type Error = GStreamerMjpegOutputError;

  fn render_result(&self, frame: &RgbFrame, _report: &FrameReport) -> Result<(), Self::Error> {
    let expected = (self.config.width, self.config.height);
    let actual = (frame.width(), frame.height());
    if expected != actual {
      return Err(GStreamerMjpegOutputError::FrameSizeMismatch { expected, actual });
    }
    self.push_frame(frame.as_ref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_config_from_url() {
    let url = Url::parse("mjpeg://127.0.0.1?port=8080&width=1280&height=720&quality=150").unwrap();
    let config = MjpegStreamConfig::from_url(&url);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 8080);
    assert_eq!((config.width, config.height, config.fps), (1280, 720, 30));
    assert_eq!(config.quality, 100);
    assert!(
      config
        .pipeline_description()
        .contains("multipartmux boundary=frame ! tcpserversink host=127.0.0.1 port=8080")
    );
  }
}
