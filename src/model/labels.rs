// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/labels.rs - 类别名称列表
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

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("读取类别文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("类别数量不足: 模型需要 {expected} 个, 文件只有 {actual} 个")]
  TooFewClasses { expected: usize, actual: usize },
}

/// 类别名称列表，行号即类别编号
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassList {
  names: Vec<String>,
}

impl ClassList {
  /// 从文本文件加载，每行一个类别名
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载类别文件: {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let list = Self::parse(&content);
    debug!("共 {} 个类别", list.len());
    Ok(list)
  }

  /// 按行切分，不做转义和注释处理
  pub fn parse(content: &str) -> Self {
    content.lines().collect()
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }

  /// 确认列表至少覆盖模型的类别宽度
  pub fn ensure_covers(self, num_classes: usize) -> Result<Self, LabelError> {
    if self.names.len() < num_classes {
      return Err(LabelError::TooFewClasses {
        expected: num_classes,
        actual: self.names.len(),
      });
    }
    Ok(self)
  }
}

impl<S: Into<String>> FromIterator<S> for ClassList {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      names: iter.into_iter().map(Into::into).collect(),
    }
  }
}
