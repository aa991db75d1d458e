// 该文件是 Yichu （衣橱） 项目的一部分。
// src/cart.rs - 购物车
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

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::inventory::Garment;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartItem {
  pub id: usize,
  pub name: String,
  pub price: f64,
  pub brand: String,
  pub filename: String,
  pub added_time: DateTime<Local>,
}

impl CartItem {
  pub fn from_garment(garment: &Garment, added_time: DateTime<Local>) -> Self {
    Self {
      id: garment.id,
      name: garment.name.clone(),
      price: garment.price,
      brand: garment.brand.clone(),
      filename: garment.filename.clone(),
      added_time,
    }
  }
}

/// 加入购物车的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAdd {
  Added,
  AlreadyInCart,
}

/// 按服装编号去重的购物车，保持加入顺序
#[derive(Debug, Clone, Default)]
pub struct Cart {
  items: Vec<CartItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartSnapshot {
  pub items: Vec<CartItem>,
  pub count: usize,
  pub total: f64,
}

impl Cart {
  pub fn contains(&self, id: usize) -> bool {
    self.items.iter().any(|item| item.id == id)
  }

  pub fn add(&mut self, item: CartItem) -> CartAdd {
    if self.contains(item.id) {
      return CartAdd::AlreadyInCart;
    }
    self.items.push(item);
    CartAdd::Added
  }

  /// 移除指定编号；不存在时什么也不做
  pub fn remove(&mut self, id: usize) {
    self.items.retain(|item| item.id != id);
  }

  pub fn clear(&mut self) {
    self.items.clear();
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn items(&self) -> &[CartItem] {
    &self.items
  }

  pub fn total(&self) -> f64 {
    self.items.iter().map(|item| item.price).sum()
  }

  pub fn snapshot(&self) -> CartSnapshot {
    CartSnapshot {
      items: self.items.clone(),
      count: self.items.len(),
      total: self.total(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::inventory::Inventory;

  fn item(inventory: &Inventory, id: usize) -> CartItem {
    CartItem::from_garment(inventory.get(id).unwrap(), Local::now())
  }

  #[test]
  fn test_add_is_idempotent() {
    let inventory = Inventory::from_filenames("/tmp", ["a.png", "b.png"]);
    let mut cart = Cart::default();
    assert_eq!(cart.add(item(&inventory, 1)), CartAdd::Added);
    assert_eq!(cart.add(item(&inventory, 1)), CartAdd::AlreadyInCart);
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.items()[0].id, 1);
  }

  #[test]
  fn test_remove_missing_is_noop() {
    let inventory = Inventory::from_filenames("/tmp", ["a.png"]);
    let mut cart = Cart::default();
    cart.add(item(&inventory, 0));
    cart.remove(7);
    assert_eq!(cart.len(), 1);
    cart.remove(0);
    assert!(cart.is_empty());
  }

  #[test]
  fn test_snapshot_totals() {
    let inventory = Inventory::from_filenames("/tmp", ["a.png", "b.png", "c.png"]);
    let mut cart = Cart::default();
    cart.add(item(&inventory, 0));
    cart.add(item(&inventory, 2));
    let snapshot = cart.snapshot();
    assert_eq!(snapshot.count, 2);
    assert!((snapshot.total - (29.99 + 39.99)).abs() < 1e-9);
    cart.clear();
    assert_eq!(cart.snapshot().count, 0);
  }
}
