// 该文件是 Beifeng （北风） 项目的一部分。
// src/bin/oneshot.rs - 单张图像检测
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
use tracing::info;
use url::Url;

use beifeng::{
  FromUrl,
  config::RenderConfig,
  input::ImageFileInput,
  model::{ClassList, YOLOV5_CLASS_NUM, Yolov5Builder},
  output::{SaveImageFileOutput, draw::Draw},
  task::{OneShotTask, Task},
};

/// 对单张图像做 YOLOv5 检测并保存绘制结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，如 yolov5:///models/yolov5s.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 类别名称文件，每行一个
  #[arg(long, value_name = "CLASSES", default_value = "classes.txt")]
  pub classes: PathBuf,
  /// 标签文字使用的 TrueType 字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 输入图像，如 image:///data/bus.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出图像，如 image:///data/bus_out.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let classes = Arc::new(ClassList::from_file(&args.classes)?.ensure_covers(YOLOV5_CLASS_NUM)?);
  let draw = Draw::new(RenderConfig::default(), classes);
  let draw = match args.font.as_ref() {
    Some(path) => draw.load_font(path)?,
    None => draw,
  };

  let input = ImageFileInput::from_url(&args.input)?;
  let model = Yolov5Builder::from_url(&args.model)?.build()?;
  let output = SaveImageFileOutput::with_draw(&args.output, draw)?;

  OneShotTask.run_task(input, model, output)
}
