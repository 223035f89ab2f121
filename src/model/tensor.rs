// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/tensor.rs - 输出张量行视图
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

//! YOLOv5 输出张量的定长行视图
//!
//! 每行 85 个浮点数：`[cx, cy, w, h, objectness, class_score_0 .. class_score_79]`。
//! 视图直接借用推理输出的连续缓冲区，不做拷贝。

use thiserror::Error;

/// 每行中框参数与目标置信度所占的宽度
const BOX_FIELDS: usize = 5;
const OBJECTNESS_OFFSET: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
  #[error("张量长度 {len} 不是行宽 {stride} 的整数倍")]
  Stride { len: usize, stride: usize },
  #[error("行宽 {0} 过小，至少需要 5 个框字段加一个类别分数")]
  RowWidth(usize),
}

/// 输出张量视图
#[derive(Debug, Clone, Copy)]
pub struct OutputTensor<'a> {
  data: &'a [f32],
  stride: usize,
}

impl<'a> OutputTensor<'a> {
  /// 以给定行宽包装连续缓冲区
  pub fn new(data: &'a [f32], stride: usize) -> Result<Self, TensorError> {
    if stride <= BOX_FIELDS {
      return Err(TensorError::RowWidth(stride));
    }
    if data.len() % stride != 0 {
      return Err(TensorError::Stride {
        len: data.len(),
        stride,
      });
    }
    Ok(Self { data, stride })
  }

  pub fn num_rows(&self) -> usize {
    self.data.len() / self.stride
  }

  pub fn num_classes(&self) -> usize {
    self.stride - BOX_FIELDS
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn row(&self, index: usize) -> Option<OutputRow<'a>> {
    let start = index.checked_mul(self.stride)?;
    self
      .data
      .get(start..start + self.stride)
      .map(|values| OutputRow { values })
  }

  pub fn rows(&self) -> impl Iterator<Item = OutputRow<'a>> + 'a {
    self
      .data
      .chunks_exact(self.stride)
      .map(|values| OutputRow { values })
  }
}

/// 单行视图
#[derive(Debug, Clone, Copy)]
pub struct OutputRow<'a> {
  values: &'a [f32],
}

impl<'a> OutputRow<'a> {
  pub fn cx(&self) -> f32 {
    self.values[0]
  }

  pub fn cy(&self) -> f32 {
    self.values[1]
  }

  pub fn w(&self) -> f32 {
    self.values[2]
  }

  pub fn h(&self) -> f32 {
    self.values[3]
  }

  pub fn objectness(&self) -> f32 {
    self.values[OBJECTNESS_OFFSET]
  }

  pub fn class_scores(&self) -> &'a [f32] {
    &self.values[BOX_FIELDS..]
  }

  /// 最高类别分数及其下标，分数相同时取第一个
  pub fn best_class(&self) -> (usize, f32) {
    let scores = self.class_scores();
    let mut best_idx = 0usize;
    let mut best_score = scores[0];
    for (idx, &score) in scores.iter().enumerate().skip(1) {
      if score > best_score {
        best_score = score;
        best_idx = idx;
      }
    }
    (best_idx, best_score)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row_with(objectness: f32, scores: &[(usize, f32)]) -> Vec<f32> {
    let mut row = vec![0.0f32; 85];
    row[..4].copy_from_slice(&[320.0, 240.0, 64.0, 32.0]);
    row[4] = objectness;
    for &(idx, score) in scores {
      row[5 + idx] = score;
    }
    row
  }

  #[test]
  fn test_rejects_partial_rows() {
    let data = vec![0.0f32; 85 * 2 + 3];
    assert_eq!(
      OutputTensor::new(&data, 85).unwrap_err(),
      TensorError::Stride { len: 173, stride: 85 }
    );
    assert_eq!(OutputTensor::new(&data, 5).unwrap_err(), TensorError::RowWidth(5));
  }

  #[test]
  fn test_empty_tensor_has_no_rows() {
    let tensor = OutputTensor::new(&[], 85).unwrap();
    assert!(tensor.is_empty());
    assert_eq!(tensor.num_rows(), 0);
    assert_eq!(tensor.rows().count(), 0);
    assert!(tensor.row(0).is_none());
  }

  #[test]
  fn test_named_fields() {
    let data = row_with(0.75, &[(10, 0.5)]);
    let tensor = OutputTensor::new(&data, 85).unwrap();
    assert_eq!(tensor.num_classes(), 80);

    let row = tensor.row(0).unwrap();
    assert_eq!((row.cx(), row.cy(), row.w(), row.h()), (320.0, 240.0, 64.0, 32.0));
    assert_eq!(row.objectness(), 0.75);
    assert_eq!(row.class_scores().len(), 80);
    assert_eq!(row.best_class(), (10, 0.5));
  }

  #[test]
  fn test_best_class_prefers_first_maximum() {
    let data = row_with(0.9, &[(3, 0.6), (7, 0.6), (50, 0.1)]);
    let tensor = OutputTensor::new(&data, 85).unwrap();
    assert_eq!(tensor.row(0).unwrap().best_class(), (3, 0.6));
  }

  #[test]
  fn test_rows_iterate_in_order() {
    let mut data = row_with(0.1, &[]);
    data.extend(row_with(0.2, &[]));
    data.extend(row_with(0.3, &[]));
    let tensor = OutputTensor::new(&data, 85).unwrap();
    let objectness: Vec<f32> = tensor.rows().map(|row| row.objectness()).collect();
    assert_eq!(objectness, vec![0.1, 0.2, 0.3]);
  }
}
