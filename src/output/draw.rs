// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/draw.rs - 检测结果绘制
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

use std::{path::Path, sync::Arc, sync::Once, time::Instant};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  config::RenderConfig,
  frame::RgbFrame,
  model::{ClassList, DetectResult, Detection},
};

// 文字基线相对标签条顶部的下移量
const LABEL_TEXT_PADDING: i32 = 2;

#[derive(Error, Debug)]
pub enum FontError {
  #[error("读取字体文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 检测结果绘制器
///
/// 每个检测框画 3 像素边框，框上方画 20 像素高的实心标签条，标签条上
/// 左侧写类别名（黑色），右移 70 像素写置信度百分比（红色）。左上角写
/// `FPS: xx.xx`（黄色）。没有字体时只画框和标签条。
pub struct Draw {
  config: RenderConfig,
  classes: Arc<ClassList>,
  font: Option<FontVec>,
  missing_font: Once,
}

impl Draw {
  pub fn new(config: RenderConfig, classes: Arc<ClassList>) -> Self {
    Self {
      config,
      classes,
      font: None,
      missing_font: Once::new(),
    }
  }

  pub fn with_font(mut self, font: FontVec) -> Self {
    self.font = Some(font);
    self
  }

  /// 从 TrueType/OpenType 文件加载字体
  pub fn load_font<P: AsRef<Path>>(self, path: P) -> Result<Self, FontError> {
    let path = path.as_ref();
    let font = FontVec::try_from_vec(std::fs::read(path)?)?;
    info!("加载字体文件: {}", path.display());
    Ok(self.with_font(font))
  }

  pub fn config(&self) -> &RenderConfig {
    &self.config
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 复制帧并在副本上绘制
  ///
  /// 帧率按推理耗时加上绘制检测框的耗时计算。
  pub fn draw_frame(&self, frame: &RgbFrame, result: &DetectResult) -> RgbImage {
    let start = Instant::now();
    let mut image = frame.to_rgb_image();
    self.draw_detections(&mut image, result);
    self.draw_fps(&mut image, result.fps_with(start.elapsed()));
    image
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
    for detection in result.items.iter() {
      self.draw_detection(image, detection);
    }
  }

  fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
    let bbox = &detection.bbox;
    let color = Rgb(self.config.color_for(detection.class_id));

    // 向内逐层加粗
    for i in 0..self.config.box_thickness as i32 {
      let (width, height) = (bbox.width - 2 * i, bbox.height - 2 * i);
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(bbox.left + i, bbox.top + i).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let label_height = self.config.label_height as i32;
    let label_top = bbox.top - label_height;
    if bbox.width > 0 && label_height > 0 {
      let strip = Rect::at(bbox.left, label_top).of_size(bbox.width as u32, label_height as u32);
      draw_filled_rect_mut(image, strip, color);
    }

    let Some(font) = self.font.as_ref() else {
      self.warn_missing_font();
      return;
    };

    let scale = PxScale::from(self.config.label_font_size);
    let text_y = label_top + LABEL_TEXT_PADDING;
    let class_name = self
      .classes
      .name(detection.class_id)
      .map(str::to_string)
      .unwrap_or_else(|| detection.class_id.to_string());
    draw_text_mut(
      image,
      Rgb(self.config.label_color),
      bbox.left,
      text_y,
      scale,
      font,
      &class_name,
    );
    draw_text_mut(
      image,
      Rgb(self.config.score_color),
      bbox.left + self.config.score_offset,
      text_y,
      scale,
      font,
      &score_label(detection.confidence),
    );
  }

  pub fn draw_fps(&self, image: &mut RgbImage, fps: f32) {
    let Some(font) = self.font.as_ref() else {
      self.warn_missing_font();
      return;
    };
    let (x, y) = self.config.fps_position;
    draw_text_mut(
      image,
      Rgb(self.config.fps_color),
      x,
      y,
      PxScale::from(self.config.fps_font_size),
      font,
      &fps_label(fps),
    );
  }

  fn warn_missing_font(&self) {
    self
      .missing_font
      .call_once(|| warn!("未加载字体，只绘制检测框，不绘制文字"));
  }
}

pub fn score_label(confidence: f32) -> String {
  format!("{:.2}%", confidence * 100.0)
}

pub fn fps_label(fps: f32) -> String {
  format!("FPS: {:.2}", fps)
}
