// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/decoder.rs - 检测结果解码
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

use tracing::debug;

use crate::{
  config::DecoderConfig,
  model::{
    BoxRect, Detection,
    nms::nms,
    tensor::{OutputRow, OutputTensor},
  },
};

/// 模型坐标到画布坐标的缩放系数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
  pub x_factor: f32,
  pub y_factor: f32,
  pub canvas_width: u32,
  pub canvas_height: u32,
}

impl ScaleFactors {
  /// 由补零后的画布尺寸与模型输入尺寸计算
  pub fn from_canvas(
    canvas_width: u32,
    canvas_height: u32,
    input_width: f32,
    input_height: f32,
  ) -> Self {
    Self {
      x_factor: canvas_width as f32 / input_width,
      y_factor: canvas_height as f32 / input_height,
      canvas_width,
      canvas_height,
    }
  }
}

/// 检测解码器：阈值过滤、取最佳类别、坐标还原，最后做 NMS
#[derive(Debug, Clone, Default)]
pub struct Decoder {
  config: DecoderConfig,
}

impl Decoder {
  pub fn new(config: DecoderConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &DecoderConfig {
    &self.config
  }

  /// 解码整张输出张量，返回 NMS 之后按保留顺序排列的检测结果
  pub fn decode(&self, tensor: &OutputTensor<'_>, scale: &ScaleFactors) -> Vec<Detection> {
    let candidates = self.candidates(tensor, scale);
    let keep = nms(
      &candidates,
      self.config.score_threshold,
      self.config.nms_threshold,
      self.config.nms_strategy,
    );
    debug!(
      "解码完成: {} 行, {} 个候选, NMS 后保留 {} 个",
      tensor.num_rows(),
      candidates.len(),
      keep.len()
    );
    keep.into_iter().map(|idx| candidates[idx]).collect()
  }

  /// 通过两道阈值的候选框，顺序与张量行顺序一致
  pub fn candidates(&self, tensor: &OutputTensor<'_>, scale: &ScaleFactors) -> Vec<Detection> {
    tensor
      .rows()
      .filter_map(|row| self.decode_row(&row, scale))
      .collect()
  }

  fn decode_row(&self, row: &OutputRow<'_>, scale: &ScaleFactors) -> Option<Detection> {
    let confidence = row.objectness();
    // NaN 也在这里被跳过
    if !(confidence >= self.config.confidence_threshold) {
      return None;
    }

    let (class_id, class_score) = row.best_class();
    if !(class_score > self.config.score_threshold) {
      return None;
    }

    let (cx, cy) = (row.cx() as f64, row.cy() as f64);
    let (w, h) = (row.w(), row.h());
    let left = ((cx - 0.5 * w as f64) * scale.x_factor as f64) as i32;
    let top = ((cy - 0.5 * h as f64) * scale.y_factor as f64) as i32;
    let width = (w * scale.x_factor) as i32;
    let height = (h * scale.y_factor) as i32;

    let bbox = BoxRect::new(left, top, width, height).clip_to(scale.canvas_width, scale.canvas_height);

    Some(Detection {
      class_id,
      confidence,
      bbox,
    })
  }
}
