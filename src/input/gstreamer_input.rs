// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 摄像头输入
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

//! # GStreamer 摄像头输入
//!
//! 先用 V4L 打开设备确认摄像头存在，再用 GStreamer 管道按帧拉取 RGB 图像：
//!
//! ```text
//! v4l2src device=/dev/videoN ! videoconvert ! video/x-raw,format=RGB ! appsink
//! ```
//!
//! URL 形式为 `camera:///dev/video0?width=1280&height=720&fps=30`，
//! 查询参数均可省略，省略时使用摄像头当前格式。

use std::{collections::HashMap, path::PathBuf};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use v4l::video::Capture;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame};

const STATE_CHANGE_TIMEOUT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum GStreamerInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无法打开摄像头 {device}: {source}")]
  CameraNotFound {
    device: String,
    source: std::io::Error,
  },
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 布尔操作错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("找不到 appsink 元素")]
  AppSinkNotFound,
  #[error("无法转换为 appsink")]
  AppSinkConversionFailed,
  #[error("无法从 caps 获取视频信息")]
  VideoInfoError,
  #[error("不支持的视频格式: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("状态切换错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

/// 系统中可用的视频设备
#[derive(Debug, Clone)]
pub struct CameraInfo {
  pub index: usize,
  pub path: PathBuf,
  pub name: Option<String>,
}

/// 枚举 `/dev/video*` 设备
pub fn list_cameras() -> Vec<CameraInfo> {
  let mut cameras: Vec<CameraInfo> = v4l::context::enum_devices()
    .into_iter()
    .map(|node| CameraInfo {
      index: node.index(),
      path: node.path().to_path_buf(),
      name: node.name(),
    })
    .collect();
  cameras.sort_by_key(|camera| camera.index);
  cameras
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GStreamerCameraInputBuilder {
  device: String,
  width: Option<u32>,
  height: Option<u32>,
  fps: Option<u32>,
}

impl FromUrlWithScheme for GStreamerCameraInputBuilder {
  const SCHEME: &'static str = "camera";
}

impl FromUrl for GStreamerCameraInputBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch(format!(
        "期望输入方式 '{}', 实际输入方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let parse = |key: &str| query.get(key).and_then(|v| v.parse::<u32>().ok());

    let device = if url.path().is_empty() || url.path() == "/" {
      "/dev/video0".to_string()
    } else {
      url.path().to_string()
    };

    Ok(Self {
      device,
      width: parse("width"),
      height: parse("height"),
      fps: parse("fps"),
    })
  }
}

impl GStreamerCameraInputBuilder {
  /// 按设备编号打开 `/dev/video{index}`
  pub fn new(index: usize) -> Self {
    Self {
      device: format!("/dev/video{}", index),
      width: None,
      height: None,
      fps: None,
    }
  }

  pub fn device(&self) -> &str {
    &self.device
  }

  pub fn resolution(mut self, width: u32, height: u32) -> Self {
    self.width = Some(width);
    self.height = Some(height);
    self
  }

  pub fn fps(mut self, fps: u32) -> Self {
    self.fps = Some(fps);
    self
  }

  fn pipeline_description(&self) -> String {
    let mut caps = Vec::new();
    if let Some(width) = self.width {
      caps.push(format!("width={}", width));
    }
    if let Some(height) = self.height {
      caps.push(format!("height={}", height));
    }
    if let Some(fps) = self.fps {
      caps.push(format!("framerate={}/1", fps));
    }

    let mut items = vec![format!("v4l2src device={}", self.device)];
    if !caps.is_empty() {
      items.push(format!("video/x-raw,{}", caps.join(",")));
    }
    items.push("videoconvert".to_string());
    items.push("video/x-raw,format=RGB".to_string());
    items.push("appsink max-buffers=2 drop=true name=sink".to_string());
    items.join(" ! ")
  }

  /// 探测设备后启动管道
  pub fn build(self) -> Result<GStreamerCameraInput, GStreamerInputError> {
    self.probe()?;

    gst::init()?;

    let description = self.pipeline_description();
    info!("GStreamer 管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("无法创建管道".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;
    // 等待异步状态切换完成，设备无法出流时在这里报错
    let (result, current, _) =
      pipeline.state(gst::ClockTime::from_seconds(STATE_CHANGE_TIMEOUT_SECS));
    if let Err(e) = result {
      let _ = pipeline.set_state(gst::State::Null);
      return Err(e.into());
    }
    debug!("管道状态: {:?}", current);

    Ok(GStreamerCameraInput { pipeline, appsink })
  }

  fn probe(&self) -> Result<(), GStreamerInputError> {
    let not_found = |source| GStreamerInputError::CameraNotFound {
      device: self.device.clone(),
      source,
    };

    let device = v4l::Device::with_path(&self.device).map_err(not_found)?;
    if let Ok(caps) = device.query_caps() {
      info!("摄像头 {}: {} ({})", self.device, caps.card, caps.driver);
    }
    let format = device.format().map_err(not_found)?;
    info!(
      "摄像头当前格式: {}x{} {}",
      format.width, format.height, format.fourcc
    );
    Ok(())
  }
}

/// 摄像头帧迭代器，取帧失败时结束
pub struct GStreamerCameraInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
}

impl Drop for GStreamerCameraInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("无法停止 GStreamer 管道: {}", e);
    }
  }
}

impl Iterator for GStreamerCameraInput {
  type Item = RgbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = match self.appsink.pull_sample() {
      Ok(sample) => sample,
      Err(e) => {
        error!("No frame! {}", e);
        return None;
      }
    };

    convert_sample_to_frame(&sample)
      .map_err(|e| {
        error!("No frame! {}", e);
        e
      })
      .ok()
  }
}

fn convert_sample_to_frame(sample: &gst::Sample) -> Result<RgbFrame, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有 caps".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let map = buffer
    .map_readable()
    .map_err(|e| GStreamerInputError::PipelineError(format!("无法映射缓冲区: {}", e)))?;

  let stride = video_info
    .stride()
    .first()
    .map(|&s| s as usize)
    .unwrap_or(video_info.width() as usize * 3);

  packed_to_frame(
    map.as_slice(),
    video_info.width(),
    video_info.height(),
    stride,
    video_info.format(),
  )
}

/// 把带行填充的 RGB/BGR 数据拷贝成紧凑的 RGB 帧
fn packed_to_frame(
  data: &[u8],
  width: u32,
  height: u32,
  stride: usize,
  format: gst_video::VideoFormat,
) -> Result<RgbFrame, GStreamerInputError> {
  let row_bytes = width as usize * 3;
  let expected = if height == 0 {
    0
  } else {
    stride * (height as usize - 1) + row_bytes
  };
  if stride < row_bytes || data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut frame = RgbFrame::with_shape(width, height);
  let dst = frame.as_mut();
  for (row, dst_row) in dst.chunks_exact_mut(row_bytes.max(1)).enumerate() {
    let src_row = &data[row * stride..row * stride + row_bytes];
    match format {
      gst_video::VideoFormat::Rgb => dst_row.copy_from_slice(src_row),
      gst_video::VideoFormat::Bgr => {
        for (dst_px, src_px) in dst_row.chunks_exact_mut(3).zip(src_row.chunks_exact(3)) {
          dst_px[0] = src_px[2];
          dst_px[1] = src_px[1];
          dst_px[2] = src_px[0];
        }
      }
      other => return Err(GStreamerInputError::UnsupportedFormat(other)),
    }
  }

  Ok(frame)
}
