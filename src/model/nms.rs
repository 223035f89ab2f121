// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use crate::{config::NmsStrategy, model::Detection};

/// 贪心 NMS，返回保留候选的下标（按保留顺序）
///
/// 置信度不大于 `score_threshold` 的候选先被剔除；其余候选按置信度降序
/// 处理（稳定排序，置信度相同保持原有顺序）。候选与所有已保留候选的 IoU
/// 都小于 `iou_threshold` 时才保留。
pub fn nms(
  candidates: &[Detection],
  score_threshold: f32,
  iou_threshold: f32,
  strategy: NmsStrategy,
) -> Vec<usize> {
  let mut order: Vec<usize> = candidates
    .iter()
    .enumerate()
    .filter(|(_, det)| det.confidence > score_threshold)
    .map(|(idx, _)| idx)
    .collect();

  order.sort_by(|&a, &b| {
    candidates[b]
      .confidence
      .partial_cmp(&candidates[a].confidence)
      .unwrap_or(Ordering::Equal)
  });

  let mut keep: Vec<usize> = Vec::new();
  for idx in order {
    let candidate = &candidates[idx];
    let suppressed = keep.iter().any(|&kept| {
      let kept = &candidates[kept];
      let comparable = match strategy {
        NmsStrategy::ClassAgnostic => true,
        NmsStrategy::PerClass => kept.class_id == candidate.class_id,
      };
      comparable && kept.bbox.iou(&candidate.bbox) >= iou_threshold
    });
    if !suppressed {
      keep.push(idx);
    }
  }

  keep
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoxRect;

  fn det(class_id: usize, confidence: f32, bbox: (i32, i32, i32, i32)) -> Detection {
    Detection {
      class_id,
      confidence,
      bbox: BoxRect::new(bbox.0, bbox.1, bbox.2, bbox.3),
    }
  }

  #[test]
  fn test_nms_empty() {
    assert!(nms(&[], 0.2, 0.4, NmsStrategy::ClassAgnostic).is_empty());
  }

  #[test]
  fn test_nms_keeps_higher_confidence_of_overlapping_pair() {
    // IoU = 7000 / 10000 = 0.7
    let candidates = [det(1, 0.6, (0, 0, 70, 100)), det(1, 0.9, (0, 0, 100, 100))];
    assert_eq!(nms(&candidates, 0.2, 0.4, NmsStrategy::ClassAgnostic), vec![1]);
  }

  #[test]
  fn test_nms_keeps_disjoint_boxes_in_confidence_order() {
    let candidates = [
      det(0, 0.5, (0, 0, 10, 10)),
      det(0, 0.8, (100, 100, 10, 10)),
      det(0, 0.7, (200, 200, 10, 10)),
    ];
    assert_eq!(
      nms(&candidates, 0.2, 0.4, NmsStrategy::ClassAgnostic),
      vec![1, 2, 0]
    );
  }

  #[test]
  fn test_nms_ties_keep_original_order() {
    let candidates = [
      det(0, 0.5, (0, 0, 10, 10)),
      det(0, 0.5, (100, 0, 10, 10)),
      det(0, 0.5, (0, 100, 10, 10)),
    ];
    assert_eq!(
      nms(&candidates, 0.2, 0.4, NmsStrategy::ClassAgnostic),
      vec![0, 1, 2]
    );
  }

  #[test]
  fn test_nms_class_agnostic_suppresses_across_classes() {
    let candidates = [det(0, 0.9, (0, 0, 100, 100)), det(5, 0.8, (5, 5, 100, 100))];
    assert_eq!(nms(&candidates, 0.2, 0.4, NmsStrategy::ClassAgnostic), vec![0]);
  }

  #[test]
  fn test_nms_per_class_keeps_other_classes() {
    let candidates = [
      det(0, 0.9, (0, 0, 100, 100)),
      det(5, 0.8, (5, 5, 100, 100)),
      det(0, 0.7, (5, 5, 100, 100)),
    ];
    assert_eq!(nms(&candidates, 0.2, 0.4, NmsStrategy::PerClass), vec![0, 1]);
  }

  #[test]
  fn test_nms_drops_candidates_at_or_below_score_threshold() {
    let candidates = [det(0, 0.2, (0, 0, 10, 10)), det(0, 0.25, (50, 50, 10, 10))];
    assert_eq!(nms(&candidates, 0.2, 0.4, NmsStrategy::ClassAgnostic), vec![1]);
  }

  #[test]
  fn test_nms_suppresses_at_exact_threshold() {
    // IoU = 0.5
    let candidates = [det(0, 0.9, (0, 0, 100, 100)), det(0, 0.8, (0, 0, 50, 100))];
    assert_eq!(nms(&candidates, 0.0, 0.5, NmsStrategy::ClassAgnostic), vec![0]);
    assert_eq!(
      nms(&candidates, 0.0, 0.51, NmsStrategy::ClassAgnostic),
      vec![0, 1]
    );
  }

  #[test]
  fn test_retained_boxes_never_overlap_beyond_threshold() {
    let mut candidates = Vec::new();
    for i in 0..40i32 {
      let offset = (i * 7) % 90;
      let confidence = 0.3 + (i as f32 * 0.013) % 0.7;
      candidates.push(det((i % 3) as usize, confidence, (offset, offset / 2, 60, 60)));
    }

    let keep = nms(&candidates, 0.2, 0.4, NmsStrategy::ClassAgnostic);
    assert!(!keep.is_empty());
    for (i, &a) in keep.iter().enumerate() {
      for &b in &keep[i + 1..] {
        assert!(candidates[a].bbox.iou(&candidates[b].bbox) < 0.4);
        assert!(candidates[a].confidence >= candidates[b].confidence);
      }
    }
  }
}
