// 该文件是 Beifeng （北风） 项目的一部分。
// src/task.rs - 任务循环
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

use std::{
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{model::Model, output::Render};

/// 收到中断信号后强制退出前的等待时间
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 取一帧，推理一次，渲染一次
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 逐帧循环：读帧、推理、渲染、检查退出条件
///
/// 循环在以下任一情况结束：输入耗尽（读帧失败）、输出端请求退出、
/// 达到指定帧数、收到 Ctrl-C。
#[derive(Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self::new()
  }
}

impl ContinuousTask {
  pub fn new() -> Self {
    Self {
      frame_number: None,
      handle_interrupt: true,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 是否安装 Ctrl-C 处理器，进程内只能安装一次
  pub fn with_interrupt_handler(mut self, enable: bool) -> Self {
    self.handle_interrupt = enable;
    self
  }

  fn install_interrupt_handler() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(rx)
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let interrupt = if self.handle_interrupt {
      Some(Self::install_interrupt_handler()?)
    } else {
      None
    };

    let mut frame_index = 0usize;
    let mut now = Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      debug!("处理第 {} 帧图像", frame_index);
      let result = model.infer(&frame)?;
      let elapsed_infer = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_total = now.elapsed();
      now = Instant::now();
      info!("第 {} 帧推理耗时: {:.2?} / {:.2?}", frame_index, elapsed_infer, elapsed_total);

      if output.poll_exit()? {
        info!("输出端请求退出，共处理 {} 帧", frame_index);
        break;
      }
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::{Cell, RefCell};

  use thiserror::Error;

  use super::*;

  #[derive(Error, Debug)]
  #[error("模拟错误")]
  struct MockError;

  /// 输出帧值的两倍
  struct DoubleModel;

  impl Model for DoubleModel {
    type Input = u32;
    type Output = u32;
    type Error = MockError;

    fn infer(&mut self, input: &u32) -> Result<u32, MockError> {
      if *input == u32::MAX {
        return Err(MockError);
      }
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct RecordOutput {
    rendered: RefCell<Vec<(u32, u32)>>,
    exit_after: Option<usize>,
    polls: Cell<usize>,
  }

  impl Render<u32, u32> for &RecordOutput {
    type Error = MockError;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), MockError> {
      self.rendered.borrow_mut().push((*frame, *result));
      Ok(())
    }

    fn poll_exit(&self) -> Result<bool, MockError> {
      self.polls.set(self.polls.get() + 1);
      Ok(self.exit_after.is_some_and(|n| self.polls.get() >= n))
    }
  }

  fn task() -> ContinuousTask {
    ContinuousTask::new().with_interrupt_handler(false)
  }

  #[test]
  fn test_continuous_runs_until_input_ends() {
    let output = RecordOutput::default();
    task()
      .run_task(1..=4u32, DoubleModel, &output)
      .unwrap();
    assert_eq!(
      *output.rendered.borrow(),
      vec![(1, 2), (2, 4), (3, 6), (4, 8)]
    );
    assert_eq!(output.polls.get(), 4);
  }

  #[test]
  fn test_continuous_stops_when_output_requests_exit() {
    let output = RecordOutput {
      exit_after: Some(2),
      ..Default::default()
    };
    task().run_task(1..100u32, DoubleModel, &output).unwrap();
    assert_eq!(output.rendered.borrow().len(), 2);
  }

  #[test]
  fn test_continuous_stops_at_frame_number() {
    let output = RecordOutput::default();
    task()
      .with_frame_number(Some(3))
      .run_task(1..100u32, DoubleModel, &output)
      .unwrap();
    assert_eq!(output.rendered.borrow().len(), 3);
  }

  #[test]
  fn test_continuous_propagates_model_error() {
    let output = RecordOutput::default();
    let frames = vec![1, u32::MAX, 3];
    assert!(
      task()
        .run_task(frames.into_iter(), DoubleModel, &output)
        .is_err()
    );
    assert_eq!(*output.rendered.borrow(), vec![(1, 2)]);
  }

  #[test]
  fn test_one_shot_uses_first_frame_only() {
    let output = RecordOutput::default();
    OneShotTask
      .run_task(vec![5u32, 6, 7].into_iter(), DoubleModel, &output)
      .unwrap();
    assert_eq!(*output.rendered.borrow(), vec![(5, 10)]);
  }

  #[test]
  fn test_one_shot_without_frames_fails() {
    let output = RecordOutput::default();
    assert!(
      OneShotTask
        .run_task(std::iter::empty::<u32>(), DoubleModel, &output)
        .is_err()
    );
    assert!(output.rendered.borrow().is_empty());
  }
}
