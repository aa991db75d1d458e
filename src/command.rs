// 该文件是 Yichu （衣橱） 项目的一部分。
// src/command.rs - 命令控制台
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


//! 按行读取命令，每条命令回应一行 JSON。与帧循环共享同一个会话。
//!
//! ```text
//! inventory | current | select <id> | next | previous
//! cart | cart add [id] | cart remove <id> | cart clear
//! status | toggle landmarks | toggle overlay | capture | photo
//! ```

use std::{
  io::{BufRead, Write},
  str::FromStr,
};

use clap::{Parser, Subcommand, error::ErrorKind};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  capture::CaptureController,
  cart::CartAdd,
  session::{SessionError, SharedSession},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
  #[error("空命令")]
  Empty,
  #[error("{message}")]
  Invalid { kind: ErrorKind, message: String },
}

impl From<clap::Error> for CommandError {
  fn from(error: clap::Error) -> Self {
    // clap 的错误信息附带用法说明，只保留第一行
    let rendered = error.to_string();
    let message = rendered
      .lines()
      .next()
      .unwrap_or_default()
      .trim_start_matches("error: ")
      .to_string();
    CommandError::Invalid {
      kind: error.kind(),
      message,
    }
  }
}

/// 控制台的一行输入
#[derive(Parser, Debug)]
#[command(
  no_binary_name = true,
  disable_help_flag = true,
  disable_help_subcommand = true,
  disable_version_flag = true
)]
struct CommandLine {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  /// 列出全部服装
  Inventory,
  Current,
  Select {
    id: usize,
  },
  Next,
  #[command(alias = "prev")]
  Previous,
  /// 不带子命令时返回购物车快照
  Cart {
    #[command(subcommand)]
    action: Option<CartAction>,
  },
  Status,
  Toggle {
    #[command(subcommand)]
    target: ToggleTarget,
  },
  Capture,
  Photo,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
  /// 缺省为当前服装
  Add { id: Option<usize> },
  Remove { id: usize },
  Clear,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleTarget {
  Landmarks,
  Overlay,
}

impl FromStr for Command {
  type Err = CommandError;

  fn from_str(line: &str) -> Result<Self, Self::Err> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
      return Err(CommandError::Empty);
    }
    let parsed = CommandLine::try_parse_from(words)?;
    Ok(parsed.command)
  }
}

fn error_response(message: impl ToString) -> Value {
  json!({ "error": message.to_string() })
}

fn session_error(error: SessionError) -> Value {
  match error {
    SessionError::InvalidSelection(_) => error_response("Invalid shirt ID"),
    SessionError::NoGarments => error_response("No shirts available"),
    SessionError::NoPhoto => error_response("No photo available"),
  }
}

fn photo_response(capture: &CaptureController, filename: &str) -> Value {
  let metadata = capture
    .photo_path(filename)
    .and_then(|path| Ok((std::fs::metadata(&path)?, path)));
  match metadata {
    Ok((metadata, path)) => json!({
      "filename": filename,
      "path": path,
      "size": metadata.len(),
    }),
    Err(e) => error_response(e),
  }
}

impl Command {
  /// 在会话上执行命令并给出 JSON 回应
  pub fn execute(&self, session: &SharedSession, capture: &CaptureController) -> Value {
    match *self {
      Command::Inventory => session.with(|s| json!(s.inventory().garments())),
      Command::Current => session.with(|s| match s.current_garment() {
        Some(garment) => json!({
          "shirt_id": garment.id,
          "shirt_name": garment.filename,
          "total_shirts": s.inventory().len(),
        }),
        None => error_response("No shirts available"),
      }),
      Command::Select { id } => session.with(|s| match s.select(id) {
        Ok(index) => json!({ "success": true, "current_shirt": index }),
        Err(e) => session_error(e),
      }),
      Command::Next => session.with(|s| match s.next() {
        Ok(index) => json!({ "success": true, "current_shirt": index }),
        Err(e) => session_error(e),
      }),
      Command::Previous => session.with(|s| match s.previous() {
        Ok(index) => json!({ "success": true, "current_shirt": index }),
        Err(e) => session_error(e),
      }),
      Command::Cart { action: None } => session.with(|s| json!(s.cart_snapshot())),
      Command::Cart {
        action: Some(CartAction::Add { id }),
      } => session.with(|s| match s.add_to_cart(id) {
        Ok(CartAdd::Added) => json!({ "success": true, "cart_count": s.cart().len() }),
        Ok(CartAdd::AlreadyInCart) => error_response("Item already in cart"),
        Err(e) => session_error(e),
      }),
      Command::Cart {
        action: Some(CartAction::Remove { id }),
      } => session.with(|s| {
        s.remove_from_cart(id);
        json!({ "success": true, "cart_count": s.cart().len() })
      }),
      Command::Cart {
        action: Some(CartAction::Clear),
      } => session.with(|s| {
        s.clear_cart();
        json!({ "success": true, "cart_count": 0 })
      }),
      Command::Status => session.with(|s| json!(s.status())),
      Command::Toggle {
        target: ToggleTarget::Landmarks,
      } => session.with(|s| json!({ "success": true, "show_landmarks": s.toggle_landmarks() })),
      Command::Toggle {
        target: ToggleTarget::Overlay,
      } => session.with(|s| {
        json!({ "success": true, "shirt_overlay_active": s.toggle_overlay() })
      }),
      Command::Capture => {
        session.with(|s| s.request_capture());
        json!({ "success": true, "message": "Photo capture initiated" })
      }
      Command::Photo => {
        let last = session.with(|s| {
          s.last_captured()
            .map(str::to_string)
            .map_err(|e| (e, s.last_capture_error().map(str::to_string)))
        });
        match last {
          // 访问文件时不持有会话锁
          Ok(filename) => photo_response(capture, &filename),
          Err((e, Some(capture_error))) => {
            json!({ "error": session_error(e)["error"], "capture_error": capture_error })
          }
          Err((e, None)) => session_error(e),
        }
      }
    }
  }
}

/// 命令控制台，通常在独立线程中读取标准输入
pub struct CommandConsole {
  session: SharedSession,
  capture: CaptureController,
}

impl CommandConsole {
  pub fn new(session: SharedSession, capture: CaptureController) -> Self {
    Self { session, capture }
  }

  pub fn handle_line(&self, line: &str) -> Value {
    match line.parse::<Command>() {
      Ok(command) => {
        debug!("执行命令: {:?}", command);
        command.execute(&self.session, &self.capture)
      }
      Err(e) => {
        warn!("无法解析命令: {}", e);
        error_response(e)
      }
    }
  }

  /// 逐行处理直到输入结束，空行被忽略
  pub fn run<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> std::io::Result<()> {
    for line in reader.lines() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      let response = self.handle_line(&line);
      writeln!(writer, "{}", response)?;
      writer.flush()?;
    }
    info!("命令输入已结束");
    Ok(())
  }
}
