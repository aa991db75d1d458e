// 该文件是 Yichu （衣橱） 项目的一部分。
// src/inventory.rs - 服装库存
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
  collections::HashMap,
  path::{Path, PathBuf},
};

use image::ImageReader;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::compositor::{GarmentSprite, sprite_from_image};

pub const KNOWN_BRANDS: [&str; 8] = [
  "Nike",
  "Adidas",
  "H&M",
  "Zara",
  "Uniqlo",
  "Gap",
  "Puma",
  "Calvin Klein",
];

const BASE_PRICE: f64 = 29.99;
const PRICE_STEP: f64 = 5.0;
const NAME_MAX_CHARS: usize = 20;
const NAME_KEEP_CHARS: usize = 17;
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "bmp"];

#[derive(Error, Debug)]
pub enum InventoryError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("无效的服装编号: {0}")]
  InvalidGarment(usize),
}

/// 一件可试穿的服装
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Garment {
  pub id: usize,
  pub name: String,
  pub filename: String,
  pub price: f64,
  pub brand: String,
  pub size: String,
  pub material: String,
  pub in_stock: bool,
  pub image_path: String,
}

impl Garment {
  fn from_filename(id: usize, filename: &str) -> Self {
    let stem = Path::new(filename)
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| filename.to_string());

    Self {
      id,
      name: format_garment_name(&stem),
      filename: filename.to_string(),
      price: BASE_PRICE + id as f64 * PRICE_STEP,
      brand: brand_for(&stem).to_string(),
      size: "M".to_string(),
      material: "Cotton Blend".to_string(),
      in_stock: true,
      image_path: format!("/static/Shirts/{}", filename),
    }
  }
}

/// 文件名转展示名：下划线和连字符变空格，首字母大写，过长截断
pub fn format_garment_name(stem: &str) -> String {
  let mut name = String::with_capacity(stem.len());
  let mut prev_cased = false;
  for ch in stem.chars() {
    let ch = if ch == '_' || ch == '-' { ' ' } else { ch };
    if ch.is_alphabetic() {
      if prev_cased {
        name.extend(ch.to_lowercase());
      } else {
        name.extend(ch.to_uppercase());
      }
      prev_cased = true;
    } else {
      name.push(ch);
      prev_cased = false;
    }
  }

  if name.chars().count() < NAME_MAX_CHARS {
    name
  } else {
    let mut short: String = name.chars().take(NAME_KEEP_CHARS).collect();
    short.push_str("...");
    short
  }
}

/// 文件名中出现的品牌，没有则按文件名长度分配一个
pub fn brand_for(stem: &str) -> &'static str {
  let lower = stem.to_lowercase();
  KNOWN_BRANDS
    .iter()
    .find(|brand| lower.contains(&brand.to_lowercase()))
    .copied()
    .unwrap_or(KNOWN_BRANDS[stem.chars().count() % KNOWN_BRANDS.len()])
}

/// 启动时从目录加载的服装列表，之后只读
#[derive(Debug, Clone, Default)]
pub struct Inventory {
  directory: PathBuf,
  garments: Vec<Garment>,
}

impl Inventory {
  /// 列出目录中的图像文件（按文件名排序）；目录不存在时得到空库存
  pub fn from_directory(directory: impl AsRef<Path>) -> Result<Self, InventoryError> {
    let directory = directory.as_ref();
    if !directory.exists() {
      warn!("服装目录不存在: {}", directory.display());
      return Ok(Self::from_filenames(directory, Vec::<String>::new()));
    }

    let mut filenames = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let entry = entry?;
      if !entry.file_type()?.is_file() {
        continue;
      }
      let path = entry.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);
      if is_image {
        filenames.push(entry.file_name().to_string_lossy().into_owned());
      }
    }
    filenames.sort();

    let inventory = Self::from_filenames(directory, filenames);
    info!(
      "在 {} 中找到 {} 件服装",
      directory.display(),
      inventory.len()
    );
    Ok(inventory)
  }

  pub fn from_filenames<I, S>(directory: impl AsRef<Path>, filenames: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let garments = filenames
      .into_iter()
      .enumerate()
      .map(|(id, name)| Garment::from_filename(id, name.as_ref()))
      .collect();
    Self {
      directory: directory.as_ref().to_path_buf(),
      garments,
    }
  }

  pub fn len(&self) -> usize {
    self.garments.len()
  }

  pub fn is_empty(&self) -> bool {
    self.garments.is_empty()
  }

  pub fn get(&self, id: usize) -> Option<&Garment> {
    self.garments.get(id)
  }

  pub fn garments(&self) -> &[Garment] {
    &self.garments
  }

  pub fn sprite_path(&self, id: usize) -> Option<PathBuf> {
    self
      .garments
      .get(id)
      .map(|garment| self.directory.join(&garment.filename))
  }

  pub fn load_sprite(&self, id: usize) -> Result<GarmentSprite, InventoryError> {
    let path = self
      .sprite_path(id)
      .ok_or(InventoryError::InvalidGarment(id))?;
    let image = ImageReader::open(&path)?.with_guessed_format()?.decode()?;
    Ok(sprite_from_image(image))
  }
}

/// 已解码贴图的缓存；解码失败的不缓存，下一帧会重试
#[derive(Debug, Default)]
pub struct SpriteCache {
  sprites: HashMap<usize, GarmentSprite>,
}

impl SpriteCache {
  pub fn get_or_load(
    &mut self,
    inventory: &Inventory,
    id: usize,
  ) -> Result<&GarmentSprite, InventoryError> {
    if !self.sprites.contains_key(&id) {
      let sprite = inventory.load_sprite(id)?;
      self.sprites.insert(id, sprite);
    }
    self
      .sprites
      .get(&id)
      .ok_or(InventoryError::InvalidGarment(id))
  }

  pub fn insert(&mut self, id: usize, sprite: GarmentSprite) {
    self.sprites.insert(id, sprite);
  }

  pub fn len(&self) -> usize {
    self.sprites.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sprites.is_empty()
  }
}
