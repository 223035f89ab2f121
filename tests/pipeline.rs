// 该文件是 Beifeng （北风） 项目的一部分。
// tests/pipeline.rs - 补零、解码与绘制的端到端测试
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

use std::{sync::Arc, time::Duration};

use image::Rgb;

use beifeng::{
  config::{DecoderConfig, RenderConfig},
  frame::RgbFrame,
  model::{
    BoxRect, ClassList, DetectResult, Decoder, OutputTensor, ScaleFactors, YOLOV5_INPUT_H,
    YOLOV5_INPUT_W, YOLOV5_ROW_WIDTH, YOLOV5_ROWS,
  },
  output::draw::Draw,
};

fn set_row(data: &mut [f32], index: usize, bbox: [f32; 4], objectness: f32, class: usize, score: f32) {
  let row = &mut data[index * YOLOV5_ROW_WIDTH..(index + 1) * YOLOV5_ROW_WIDTH];
  row[..4].copy_from_slice(&bbox);
  row[4] = objectness;
  row[5 + class] = score;
}

fn full_tensor() -> Vec<f32> {
  let mut data = vec![0.0f32; YOLOV5_ROWS * YOLOV5_ROW_WIDTH];
  set_row(&mut data, 100, [320.0, 180.0, 100.0, 50.0], 0.9, 0, 0.9);
  // 与上一行高度重叠，置信度较低
  set_row(&mut data, 9000, [322.0, 181.0, 100.0, 50.0], 0.7, 0, 0.8);
  // 不重叠的另一类
  set_row(&mut data, 20000, [100.0, 100.0, 40.0, 40.0], 0.6, 2, 0.5);
  // 目标置信度不足
  set_row(&mut data, 25199, [500.0, 100.0, 40.0, 40.0], 0.3, 5, 0.99);
  data
}

#[test]
fn decode_landscape_frame() {
  let frame = RgbFrame::with_shape(1280, 720);
  let canvas = frame.pad_to_square();
  assert_eq!((canvas.width(), canvas.height()), (1280, 1280));

  let scale = ScaleFactors::from_canvas(
    canvas.width(),
    canvas.height(),
    YOLOV5_INPUT_W,
    YOLOV5_INPUT_H,
  );
  assert_eq!(scale.x_factor, 2.0);

  let data = full_tensor();
  let tensor = OutputTensor::new(&data, YOLOV5_ROW_WIDTH).unwrap();
  assert_eq!(tensor.num_rows(), YOLOV5_ROWS);

  let detections = Decoder::new(DecoderConfig::default()).decode(&tensor, &scale);
  assert_eq!(detections.len(), 2);
  assert_eq!(detections[0].class_id, 0);
  assert_eq!(detections[0].confidence, 0.9);
  assert_eq!(detections[0].bbox, BoxRect::new(540, 310, 200, 100));
  assert_eq!(detections[1].class_id, 2);
  assert_eq!(detections[1].bbox, BoxRect::new(160, 160, 80, 80));

  for detection in &detections {
    assert!(detection.bbox.left >= 0 && detection.bbox.top >= 0);
    assert!(detection.bbox.right() <= canvas.width() as i32);
    assert!(detection.bbox.bottom() <= canvas.height() as i32);
  }
}

#[test]
fn decode_and_annotate_frame() {
  let frame = RgbFrame::with_shape(1280, 720);
  let canvas = frame.pad_to_square();
  let scale = ScaleFactors::from_canvas(
    canvas.width(),
    canvas.height(),
    YOLOV5_INPUT_W,
    YOLOV5_INPUT_H,
  );

  let data = full_tensor();
  let tensor = OutputTensor::new(&data, YOLOV5_ROW_WIDTH).unwrap();
  let result = DetectResult {
    items: Decoder::default().decode(&tensor, &scale).into_boxed_slice(),
    elapsed: Duration::from_millis(25),
  };

  let classes: ClassList = (0..80).map(|i| format!("class_{}", i)).collect();
  let draw = Draw::new(RenderConfig::default(), Arc::new(classes));
  let image = draw.draw_frame(&frame, &result);

  assert_eq!(image.dimensions(), (1280, 720));
  // 类别 0 青色，类别 2 黄色
  assert_eq!(*image.get_pixel(540, 350), Rgb([0, 255, 255]));
  assert_eq!(*image.get_pixel(600, 300), Rgb([0, 255, 255]));
  assert_eq!(*image.get_pixel(160, 200), Rgb([255, 255, 0]));
  assert_eq!(*image.get_pixel(640, 360), Rgb([0, 0, 0]));
}
