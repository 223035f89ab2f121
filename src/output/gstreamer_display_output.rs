// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/gstreamer_display_output.rs - GStreamer 窗口显示输出
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

//! # GStreamer 窗口显示
//!
//! 把绘制好的帧推入 `appsrc ! videoconvert ! autovideosink`，并在每帧之后
//! 检查总线上的导航消息。窗口内按下任意键、窗口被关闭或管道出错时
//! [`Render::poll_exit`] 返回 `true`。

use std::{cell::Cell, time::Duration};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  frame::RgbFrame,
  model::DetectResult,
  output::{Render, draw::Draw},
};

/// 每帧之后等待按键的时间
pub const KEY_POLL_TIMEOUT: Duration = Duration::from_millis(15);

const NAVIGATION_MESSAGE: &str = "GstNavigationMessage";

#[derive(Error, Debug)]
pub enum GStreamerDisplayOutputError {
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 布尔操作错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("找不到 appsrc 元素")]
  AppSrcNotFound,
  #[error("无法转换为 appsrc")]
  AppSrcConversionFailed,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("状态切换错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("推送缓冲区失败: {0:?}")]
  FlowError(gst::FlowError),
}

pub struct GStreamerDisplayOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  bus: gst::Bus,
  draw: Draw,
  title: String,
  frame_size: Cell<Option<(u32, u32)>>,
  title_sent: Cell<bool>,
  frame_count: Cell<u64>,
}

impl GStreamerDisplayOutput {
  /// 创建显示窗口，`title` 作为窗口标题
  pub fn new(title: impl Into<String>, draw: Draw) -> Result<Self, GStreamerDisplayOutputError> {
    gst::init()?;

    let description = "appsrc name=src is-live=true do-timestamp=true format=time \
                       ! videoconvert ! autovideosink sync=false";
    info!("创建显示管道: {}", description);

    let pipeline = gst::parse::launch(description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerDisplayOutputError::PipelineError("无法创建管道".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerDisplayOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerDisplayOutputError::AppSrcConversionFailed)?;

    let bus = pipeline
      .bus()
      .ok_or_else(|| GStreamerDisplayOutputError::PipelineError("管道没有总线".to_string()))?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(Self {
      pipeline,
      appsrc,
      bus,
      draw,
      title: title.into(),
      frame_size: Cell::new(None),
      title_sent: Cell::new(false),
      frame_count: Cell::new(0),
    })
  }

  fn push_image(&self, data: &[u8], width: u32, height: u32) -> Result<(), GStreamerDisplayOutputError> {
    let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, width, height).build()?;

    if self.frame_size.get() != Some((width, height)) {
      debug!("显示尺寸: {}x{}", width, height);
      self.appsrc.set_caps(Some(&info.to_caps()?));
      self.frame_size.set(Some((width, height)));
    }

    let stride = info
      .stride()
      .first()
      .map(|&s| s as usize)
      .unwrap_or(width as usize * 3);
    let buffer = gst::Buffer::from_mut_slice(pad_rows(data, width, height, stride));
    self
      .appsrc
      .push_buffer(buffer)
      .map_err(GStreamerDisplayOutputError::FlowError)?;
    self.frame_count.set(self.frame_count.get() + 1);

    if !self.title_sent.get() {
      self.send_title();
      self.title_sent.set(true);
    }
    Ok(())
  }

  fn send_title(&self) {
    let mut tags = gst::TagList::new();
    if let Some(tags) = tags.get_mut() {
      tags.add::<gst::tags::Title>(&self.title.as_str(), gst::TagMergeMode::Replace);
    }
    if !self.appsrc.send_event(gst::event::Tag::new(tags)) {
      warn!("无法设置窗口标题: {}", self.title);
    }
  }

  /// 读取总线消息，返回是否应当退出
  fn poll_bus(&self) -> bool {
    let types = [
      gst::MessageType::Element,
      gst::MessageType::Eos,
      gst::MessageType::Error,
    ];

    let mut timeout = gst::ClockTime::from_mseconds(KEY_POLL_TIMEOUT.as_millis() as u64);
    let mut exit = false;
    while let Some(message) = self.bus.timed_pop_filtered(timeout, &types) {
      timeout = gst::ClockTime::ZERO;
      match message.view() {
        gst::MessageView::Eos(..) => {
          info!("显示窗口已关闭");
          exit = true;
        }
        gst::MessageView::Error(err) => {
          error!("显示管道错误: {} ({:?})", err.error(), err.debug());
          exit = true;
        }
        gst::MessageView::Element(element) => {
          if element.structure().is_some_and(is_key_press) {
            info!("检测到按键");
            exit = true;
          }
        }
        _ => {}
      }
    }
    exit
  }
}

/// 导航消息中是否携带按键事件
fn is_key_press(structure: &gst::StructureRef) -> bool {
  if !structure.has_name(NAVIGATION_MESSAGE) {
    return false;
  }
  let Ok(event) = structure.get::<gst::Event>("event") else {
    return false;
  };
  event
    .structure()
    .and_then(|s| s.get::<&str>("event").ok())
    .is_some_and(|kind| kind == "key-press")
}

/// 紧凑的 RGB 行按 `stride` 重新排布
fn pad_rows(data: &[u8], width: u32, height: u32, stride: usize) -> Vec<u8> {
  let row_bytes = width as usize * 3;
  // 步长不足一行时无法重排，原样返回
  if stride <= row_bytes {
    return data.to_vec();
  }
  if row_bytes == 0 {
    return vec![0u8; stride * height as usize];
  }
  let mut padded = vec![0u8; stride * height as usize];
  for (dst, src) in padded
    .chunks_exact_mut(stride)
    .zip(data.chunks_exact(row_bytes))
  {
    dst[..row_bytes].copy_from_slice(src);
  }
  padded
}

impl Drop for GStreamerDisplayOutput {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("无法停止显示管道: {}", e);
    }
    info!("显示窗口关闭，共显示 {} 帧", self.frame_count.get());
  }
}

impl Render<RgbFrame, DetectResult> for GStreamerDisplayOutput {
  type Error = GStreamerDisplayOutputError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let image = self.draw.draw_frame(frame, result);
    self.push_image(image.as_raw(), image.width(), image.height())
  }

  fn poll_exit(&self) -> Result<bool, Self::Error> {
    Ok(self.poll_bus())
  }
}
