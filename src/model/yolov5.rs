// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/yolov5.rs - YOLOv5 ONNX 模型
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

use std::{path::Path, time::Instant};

use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use ndarray::Array4;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::DecoderConfig,
  frame::RgbFrame,
  input::AsNhwcFrame,
  model::{DetectResult, Model, decoder::Decoder, decoder::ScaleFactors, tensor::OutputTensor},
};

pub const YOLOV5_INPUT_W: f32 = 640.0;
pub const YOLOV5_INPUT_H: f32 = 640.0;
pub const YOLOV5_CLASS_NUM: usize = 80;
pub const YOLOV5_ROW_WIDTH: usize = 5 + YOLOV5_CLASS_NUM;
pub const YOLOV5_ROWS: usize = 25200;

#[derive(Error, Debug)]
pub enum Yolov5Error {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("输出形状不符: 期望 [1, {rows}, {width}], 实际 {actual:?}")]
  OutputShape {
    rows: usize,
    width: usize,
    actual: Vec<i64>,
  },
  #[error("输出张量错误: {0}")]
  TensorError(#[from] crate::model::TensorError),
  #[error("画布数据错误")]
  CanvasError,
}

pub struct Yolov5Builder {
  model_path: String,
  decoder: DecoderConfig,
  cuda: bool,
}

impl FromUrlWithScheme for Yolov5Builder {
  const SCHEME: &'static str = "yolov5";
}

impl FromUrl for Yolov5Builder {
  type Error = Yolov5Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolov5Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(Yolov5Builder::new(url.path()))
  }
}

impl Yolov5Builder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      decoder: DecoderConfig::default(),
      cuda: false,
    }
  }

  pub fn model_path(&self) -> &str {
    &self.model_path
  }

  pub fn decoder_config(mut self, config: DecoderConfig) -> Self {
    self.decoder = config;
    self
  }

  /// 尝试使用 CUDA 执行推理，注册失败时 ONNX Runtime 会退回 CPU
  pub fn cuda(mut self, enable: bool) -> Self {
    self.cuda = enable;
    self
  }

  pub fn build(self) -> Result<Yolov5, Yolov5Error> {
    let path = Path::new(&self.model_path);
    if !path.exists() {
      return Err(Yolov5Error::ModelNotFound(self.model_path));
    }

    info!("加载模型文件: {}", self.model_path);
    #[allow(unused_mut)]
    let mut builder = Session::builder()
      .map_err(|e| Yolov5Error::ModelLoadError(format!("无法创建会话构建器: {e}")))?;

    if self.cuda {
      info!("尝试使用 CUDA");
      #[cfg(feature = "cuda")]
      {
        builder = builder
          .with_execution_providers([
            ort::execution_providers::CUDAExecutionProvider::default().build(),
          ])
          .map_err(|e| Yolov5Error::ModelLoadError(format!("无法注册 CUDA: {e}")))?;
      }
      #[cfg(not(feature = "cuda"))]
      tracing::warn!("未启用 cuda 特性，使用 CPU 推理");
    }

    let session = builder
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| Yolov5Error::ModelLoadError(format!("无法设置优化级别: {e}")))?
      .commit_from_file(path)
      .map_err(|e| Yolov5Error::ModelLoadError(format!("无法加载模型: {e}")))?;

    for input in &session.inputs {
      debug!("模型输入: {}", input.name);
    }
    for output in &session.outputs {
      debug!("模型输出: {}", output.name);
    }
    info!("模型加载完成");

    Ok(Yolov5 {
      session,
      decoder: Decoder::new(self.decoder),
    })
  }
}

pub struct Yolov5 {
  session: Session,
  decoder: Decoder,
}

impl Yolov5 {
  pub fn decoder(&self) -> &Decoder {
    &self.decoder
  }
}

impl Model for Yolov5 {
  type Input = RgbFrame;
  type Output = DetectResult;
  type Error = Yolov5Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let start = Instant::now();

    let canvas = input.pad_to_square();
    let scale = ScaleFactors::from_canvas(
      canvas.width(),
      canvas.height(),
      YOLOV5_INPUT_W,
      YOLOV5_INPUT_H,
    );
    debug!(
      "画布 {}x{}, 缩放系数 ({:.3}, {:.3})",
      canvas.width(),
      canvas.height(),
      scale.x_factor,
      scale.y_factor
    );

    let blob = blob_from_canvas(&canvas, YOLOV5_INPUT_W as u32, YOLOV5_INPUT_H as u32)?;

    debug!("执行模型推理");
    let input_tensor = TensorRef::from_array_view(blob.view())?;
    let outputs = self.session.run(ort::inputs![input_tensor])?;

    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
    check_output_shape(shape)?;

    let tensor = OutputTensor::new(data, YOLOV5_ROW_WIDTH)?;
    let items = self.decoder.decode(&tensor, &scale);

    Ok(DetectResult {
      items: items.into_boxed_slice(),
      elapsed: start.elapsed(),
    })
  }
}

/// 输出必须是 `[1, 25200, 85]`
fn check_output_shape(shape: &[i64]) -> Result<(), Yolov5Error> {
  let expected = [1, YOLOV5_ROWS as i64, YOLOV5_ROW_WIDTH as i64];
  if shape != expected.as_slice() {
    return Err(Yolov5Error::OutputShape {
      rows: YOLOV5_ROWS,
      width: YOLOV5_ROW_WIDTH,
      actual: shape.to_vec(),
    });
  }
  Ok(())
}

/// 正方形画布缩放到模型输入尺寸，归一化到 `[0, 1]` 并转为 NCHW
fn blob_from_canvas(canvas: &RgbFrame, width: u32, height: u32) -> Result<Array4<f32>, Yolov5Error> {
  let image = RgbImage::from_raw(canvas.width(), canvas.height(), canvas.as_nhwc().to_vec())
    .ok_or(Yolov5Error::CanvasError)?;
  let resized = imageops::resize(&image, width, height, FilterType::Triangle);

  Ok(Array4::from_shape_fn(
    (1, 3, height as usize, width as usize),
    |(_, c, y, x)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
  ))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builder_from_url() {
    let url = Url::parse("yolov5:///models/yolov5s.onnx").unwrap();
    let builder = Yolov5Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), "/models/yolov5s.onnx");

    let url = Url::parse("image:///models/yolov5s.onnx").unwrap();
    assert!(matches!(
      Yolov5Builder::from_url(&url),
      Err(Yolov5Error::ModelPathError(_))
    ));
  }

  #[test]
  fn test_missing_model_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("yolov5s.onnx");
    let result = Yolov5Builder::new(path.to_string_lossy()).build();
    assert!(matches!(result, Err(Yolov5Error::ModelNotFound(_))));
  }

  #[test]
  fn test_output_shape_check() {
    assert!(check_output_shape(&[1, 25200, 85]).is_ok());
    match check_output_shape(&[1, 8400, 84]) {
      Err(Yolov5Error::OutputShape { actual, .. }) => assert_eq!(actual, vec![1, 8400, 84]),
      other => panic!("unexpected result: {:?}", other.err()),
    }
  }

  #[test]
  fn test_blob_layout_and_normalisation() {
    let mut canvas = RgbFrame::with_shape(4, 4);
    for pixel in canvas.as_mut().chunks_exact_mut(3) {
      pixel.copy_from_slice(&[255, 0, 51]);
    }

    let blob = blob_from_canvas(&canvas, 8, 8).unwrap();
    assert_eq!(blob.shape(), &[1, 3, 8, 8]);
    assert!((blob[[0, 0, 3, 5]] - 1.0).abs() < 1e-6);
    assert!(blob[[0, 1, 7, 0]].abs() < 1e-6);
    assert!((blob[[0, 2, 0, 7]] - 0.2).abs() < 1e-6);
  }
}
