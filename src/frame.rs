// 该文件是 Beifeng （北风） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};

use crate::input::AsNhwcFrame;

const RGB_CHANNELS: usize = 3;

/// RGB 帧，按 NHWC（行优先，逐像素 RGB）存储
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RgbFrame {
  /// 创建全零帧
  pub fn with_shape(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * (width as usize) * (height as usize);
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  /// 从原始 RGB 数据创建帧，长度不匹配时返回 `None`
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
    if data.len() != RGB_CHANNELS * (width as usize) * (height as usize) {
      return None;
    }
    Some(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = ((y as usize) * (self.width as usize) + (x as usize)) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  /// 将帧补零成正方形画布
  ///
  /// 画布边长为 `max(width, height)`，原图放在左上角，右侧和下方补零，
  /// 不做任何缩放。已经是正方形的帧原样返回。
  pub fn pad_to_square(&self) -> RgbFrame {
    let side = self.width.max(self.height);
    if side == self.width && side == self.height {
      return self.clone();
    }

    let mut canvas = RgbFrame::with_shape(side, side);
    // 宽为 0 时没有可拷贝的像素，直接返回全零画布
    if self.width == 0 {
      return canvas;
    }
    let src_stride = self.width as usize * RGB_CHANNELS;
    let dst_stride = side as usize * RGB_CHANNELS;
    let dst = canvas.as_mut();
    for (row, src_row) in self.data.chunks_exact(src_stride).enumerate() {
      let offset = row * dst_stride;
      dst[offset..offset + src_stride].copy_from_slice(src_row);
    }
    canvas
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(self.width, self.height, |x, y| Rgb(self.pixel(x, y)))
  }
}

impl From<RgbImage> for RgbFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl AsMut<[u8]> for RgbFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsNhwcFrame for RgbFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }
}
