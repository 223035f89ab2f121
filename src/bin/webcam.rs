// 该文件是 Beifeng （北风） 项目的一部分。
// src/bin/webcam.rs - 摄像头实时检测
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

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

use beifeng::{
  FromUrl,
  config::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NMS_THRESHOLD, DEFAULT_SCORE_THRESHOLD, DecoderConfig,
    NmsStrategy, RenderConfig,
  },
  input::{GStreamerCameraInputBuilder, GStreamerInputError, list_cameras},
  model::{ClassList, YOLOV5_CLASS_NUM, Yolov5Builder},
  output::{GStreamerDisplayOutput, draw::Draw},
  task::{ContinuousTask, Task},
};

const WINDOW_TITLE: &str = "webcam";

/// 摄像头 YOLOv5 实时检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 摄像头编号，对应 /dev/video{N}
  #[arg(long, value_name = "INDEX", default_value_t = 0)]
  pub camera: usize,
  /// 摄像头地址，如 camera:///dev/video1?width=1280&height=720，指定后忽略 --camera
  #[arg(long, value_name = "SOURCE")]
  pub input: Option<Url>,
  /// 采集宽度，需与 --height 一起指定
  #[arg(long, requires = "height")]
  pub width: Option<u32>,
  /// 采集高度，需与 --width 一起指定
  #[arg(long, requires = "width")]
  pub height: Option<u32>,
  /// 采集帧率
  #[arg(long)]
  pub fps: Option<u32>,
  /// ONNX 模型文件路径
  #[arg(long, value_name = "MODEL", default_value = "yolov5s.onnx")]
  pub model: PathBuf,
  /// 类别名称文件，每行一个
  #[arg(long, value_name = "CLASSES", default_value = "classes.txt")]
  pub classes: PathBuf,
  /// 标签文字使用的 TrueType 字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
  pub confidence_threshold: f32,
  #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD)]
  pub score_threshold: f32,
  #[arg(long, default_value_t = DEFAULT_NMS_THRESHOLD)]
  pub nms_threshold: f32,
  /// 按类别分别做 NMS
  #[arg(long)]
  pub per_class_nms: bool,
  /// 尝试使用 CUDA 推理
  #[arg(long)]
  pub cuda: bool,
  /// 处理指定帧数后退出
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 列出可用摄像头后退出
  #[arg(long)]
  pub list_cameras: bool,
}

impl Args {
  fn camera_builder(&self) -> Result<GStreamerCameraInputBuilder, GStreamerInputError> {
    let mut builder = match self.input.as_ref() {
      Some(url) => GStreamerCameraInputBuilder::from_url(url)?,
      None => GStreamerCameraInputBuilder::new(self.camera),
    };
    if let (Some(width), Some(height)) = (self.width, self.height) {
      builder = builder.resolution(width, height);
    }
    if let Some(fps) = self.fps {
      builder = builder.fps(fps);
    }
    Ok(builder)
  }

  fn decoder_config(&self) -> DecoderConfig {
    let strategy = if self.per_class_nms {
      NmsStrategy::PerClass
    } else {
      NmsStrategy::ClassAgnostic
    };
    DecoderConfig::default()
      .with_confidence_threshold(self.confidence_threshold)
      .with_score_threshold(self.score_threshold)
      .with_nms_threshold(self.nms_threshold)
      .with_nms_strategy(strategy)
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  if args.list_cameras {
    for camera in list_cameras() {
      println!(
        "{}\t{}\t{}",
        camera.index,
        camera.path.display(),
        camera.name.as_deref().unwrap_or("-")
      );
    }
    return Ok(());
  }

  // 先打开摄像头，失败时不必加载模型
  let input = match args.camera_builder().and_then(|builder| builder.build()) {
    Ok(input) => input,
    Err(e) => {
      error!("{}", e);
      eprintln!("No camera detected!");
      std::process::exit(-1);
    }
  };

  info!("模型文件路径: {}", args.model.display());
  info!("类别文件路径: {}", args.classes.display());

  let classes = Arc::new(ClassList::from_file(&args.classes)?.ensure_covers(YOLOV5_CLASS_NUM)?);

  let model = Yolov5Builder::new(args.model.to_string_lossy())
    .decoder_config(args.decoder_config())
    .cuda(args.cuda)
    .build()?;

  let draw = Draw::new(RenderConfig::default(), classes);
  let draw = match args.font.as_ref() {
    Some(path) => draw.load_font(path)?,
    None => {
      warn!("未指定字体，检测结果不显示文字");
      draw
    }
  };

  let output = GStreamerDisplayOutput::new(WINDOW_TITLE, draw)?;

  ContinuousTask::new()
    .with_frame_number(args.frame_number)
    .run_task(input, model, output)
}
