// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型
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

use std::time::Duration;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 轴对齐矩形，画布像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoxRect {
  pub left: i32,
  pub top: i32,
  pub width: i32,
  pub height: i32,
}

impl BoxRect {
  pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
    Self {
      left,
      top,
      width,
      height,
    }
  }

  pub fn right(&self) -> i32 {
    self.left.saturating_add(self.width)
  }

  pub fn bottom(&self) -> i32 {
    self.top.saturating_add(self.height)
  }

  /// 面积，宽或高非正时为 0
  pub fn area(&self) -> i64 {
    if self.width <= 0 || self.height <= 0 {
      return 0;
    }
    self.width as i64 * self.height as i64
  }

  /// 两个矩形的交集，不相交时返回空矩形
  pub fn intersection(&self, other: &BoxRect) -> BoxRect {
    let left = self.left.max(other.left);
    let top = self.top.max(other.top);
    let right = self.right().min(other.right());
    let bottom = self.bottom().min(other.bottom());
    if right <= left || bottom <= top {
      return BoxRect::default();
    }
    BoxRect::new(left, top, right - left, bottom - top)
  }

  /// 交并比；两个矩形面积都为 0 时视为完全重合
  pub fn iou(&self, other: &BoxRect) -> f32 {
    let area_a = self.area();
    let area_b = other.area();
    if area_a + area_b <= 0 {
      return 1.0;
    }
    let inter = self.intersection(other).area();
    (inter as f64 / (area_a + area_b - inter) as f64) as f32
  }

  /// 裁剪到 `[0, width] x [0, height]` 范围内
  pub fn clip_to(&self, width: u32, height: u32) -> BoxRect {
    // 在 i64 中计算，坐标接近 i32 边界时也不会溢出
    let limit = i32::MAX as i64;
    let (width, height) = ((width as i64).min(limit), (height as i64).min(limit));
    let left = (self.left as i64).clamp(0, width);
    let top = (self.top as i64).clamp(0, height);
    let right = (self.left as i64 + self.width as i64).clamp(left, width);
    let bottom = (self.top as i64 + self.height as i64).clamp(top, height);
    BoxRect::new(
      left as i32,
      top as i32,
      (right - left) as i32,
      (bottom - top) as i32,
    )
  }
}

/// 单个检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub class_id: usize,
  pub confidence: f32,
  pub bbox: BoxRect,
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
  /// 预处理、推理与解码的总耗时
  pub elapsed: Duration,
}

impl DetectResult {
  pub fn fps(&self) -> f32 {
    self.fps_with(Duration::ZERO)
  }

  /// 计入额外耗时（例如绘制）后的帧率
  pub fn fps_with(&self, extra: Duration) -> f32 {
    let secs = (self.elapsed + extra).as_secs_f32();
    if secs > 0.0 { 1.0 / secs } else { 0.0 }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

pub mod decoder;
pub mod labels;
pub mod nms;
pub mod tensor;
mod yolov5;

pub use self::decoder::{Decoder, ScaleFactors};
pub use self::labels::{ClassList, LabelError};
pub use self::tensor::{OutputRow, OutputTensor, TensorError};
pub use self::yolov5::{
  YOLOV5_CLASS_NUM, YOLOV5_INPUT_H, YOLOV5_INPUT_W, YOLOV5_ROW_WIDTH, YOLOV5_ROWS, Yolov5,
  Yolov5Builder, Yolov5Error,
};
