// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::Path;

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrlWithScheme,
  frame::RgbFrame,
  model::DetectResult,
  output::{Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把绘制后的帧写入图像文件，格式由扩展名决定
pub struct SaveImageFileOutput {
  path: String,
  draw: Draw,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl crate::FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  /// 使用不带字体与类别名的绘制器；需要文字时用 [`SaveImageFileOutput::new`]
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Self::with_draw(url, Draw::new(Default::default(), Default::default()))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<String>, draw: Draw) -> Self {
    Self {
      path: path.into(),
      draw,
    }
  }

  pub fn with_draw(url: &Url, draw: Draw) -> Result<Self, SaveImageFileError> {
    if url.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(Self::new(url.path(), draw))
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  fn save_image(&self, image: RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<RgbFrame, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let image = self.draw.draw_frame(frame, result);
    self.save_image(image)
  }
}
