// 该文件是 Beifeng （北风） 项目的一部分。
// src/config.rs - 解码与绘制配置
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

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.2;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;

/// 默认调色板（RGB）：青、绿、黄、蓝
pub const DEFAULT_PALETTE: [[u8; 3]; 4] = [[0, 255, 255], [0, 255, 0], [255, 255, 0], [0, 0, 255]];

/// NMS 分组方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NmsStrategy {
  /// 不区分类别，任何高置信度框都可以抑制与之重叠的框
  #[default]
  ClassAgnostic,
  /// 仅抑制同一类别内的重叠框
  PerClass,
}

/// 检测解码器配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderConfig {
  /// 目标置信度（objectness）阈值，小于该值的行直接跳过
  pub confidence_threshold: f32,
  /// 最佳类别分数阈值，不大于该值的行跳过
  pub score_threshold: f32,
  /// NMS IoU 阈值
  pub nms_threshold: f32,
  pub nms_strategy: NmsStrategy,
}

impl Default for DecoderConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      nms_strategy: NmsStrategy::ClassAgnostic,
    }
  }
}

impl DecoderConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_score_threshold(mut self, threshold: f32) -> Self {
    self.score_threshold = threshold;
    self
  }

  pub fn with_nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn with_nms_strategy(mut self, strategy: NmsStrategy) -> Self {
    self.nms_strategy = strategy;
    self
  }
}

/// 绘制配置
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
  pub palette: Vec<[u8; 3]>,
  /// 边框线宽（像素）
  pub box_thickness: u32,
  /// 标签条高度（像素）
  pub label_height: u32,
  /// 置信度文本相对框左边的偏移
  pub score_offset: i32,
  pub label_font_size: f32,
  pub label_color: [u8; 3],
  pub score_color: [u8; 3],
  pub fps_font_size: f32,
  pub fps_color: [u8; 3],
  /// FPS 文本位置
  pub fps_position: (i32, i32),
}

impl Default for RenderConfig {
  fn default() -> Self {
    Self {
      palette: DEFAULT_PALETTE.to_vec(),
      box_thickness: 3,
      label_height: 20,
      score_offset: 70,
      label_font_size: 16.0,
      label_color: [0, 0, 0],
      score_color: [255, 0, 0],
      fps_font_size: 30.0,
      fps_color: [255, 255, 0],
      fps_position: (10, 25),
    }
  }
}

impl RenderConfig {
  /// 按类别编号选取颜色，调色板为空时退回白色
  pub fn color_for(&self, class_id: usize) -> [u8; 3] {
    if self.palette.is_empty() {
      return [255, 255, 255];
    }
    self.palette[class_id % self.palette.len()]
  }
}
