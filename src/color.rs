use crate::error::MarkError;
use image::{Rgb, Rgba};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 水印颜色
///
/// 支持颜色名（`white`、`black`、`red` ...）以及 `#RGB`、`#RRGGBB`、`#RRGGBBAA`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
   pub r: u8,
   pub g: u8,
   pub b: u8,
   pub a: u8,
}

impl Color {
   pub const WHITE: Color = Color::rgb(255, 255, 255);
   pub const BLACK: Color = Color::rgb(0, 0, 0);

   pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
      Self { r, g, b, a: 255 }
   }

   pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
      Self { r, g, b, a }
   }

   /// 按给定透明度系数（0.0 - 1.0）生成像素，颜色自带的 alpha 一并参与
   pub fn with_coverage(&self, coverage: f32) -> Rgba<u8> {
      let alpha = (self.a as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
      Rgba([self.r, self.g, self.b, alpha])
   }

   fn named(name: &str) -> Option<Self> {
      let color = match name {
         "white" => Self::WHITE,
         "black" => Self::BLACK,
         "red" => Self::rgb(255, 0, 0),
         "green" => Self::rgb(0, 128, 0),
         "lime" => Self::rgb(0, 255, 0),
         "blue" => Self::rgb(0, 0, 255),
         "yellow" => Self::rgb(255, 255, 0),
         "cyan" => Self::rgb(0, 255, 255),
         "magenta" => Self::rgb(255, 0, 255),
         "orange" => Self::rgb(255, 165, 0),
         "gray" | "grey" => Self::rgb(128, 128, 128),
         "silver" => Self::rgb(192, 192, 192),
         _ => return None,
      };
      Some(color)
   }

   fn from_hex(hex: &str) -> Option<Self> {
      let digit = |s: &str| u8::from_str_radix(s, 16).ok();
      match hex.len() {
         3 => {
            let r = digit(&hex[0..1])?;
            let g = digit(&hex[1..2])?;
            let b = digit(&hex[2..3])?;
            Some(Self::rgb(r * 17, g * 17, b * 17))
         }
         6 | 8 => {
            let r = digit(&hex[0..2])?;
            let g = digit(&hex[2..4])?;
            let b = digit(&hex[4..6])?;
            let a = if hex.len() == 8 { digit(&hex[6..8])? } else { 255 };
            Some(Self::rgba(r, g, b, a))
         }
         _ => None,
      }
   }
}

impl FromStr for Color {
   type Err = MarkError;

   fn from_str(s: &str) -> Result<Self, Self::Err> {
      let value = s.trim().to_lowercase();
      let parsed = match value.strip_prefix('#') {
         Some(hex) if hex.is_ascii() => Self::from_hex(hex),
         Some(_) => None,
         None => Self::named(&value),
      };
      parsed.ok_or_else(|| MarkError::InvalidConfiguration(format!("无法识别的颜色：{s}")))
   }
}

impl TryFrom<String> for Color {
   type Error = MarkError;

   fn try_from(value: String) -> Result<Self, Self::Error> {
      value.parse()
   }
}

impl From<Color> for String {
   fn from(color: Color) -> Self {
      color.to_string()
   }
}

impl fmt::Display for Color {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      if self.a == 255 {
         write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
      } else {
         write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
      }
   }
}

impl From<Color> for Rgba<u8> {
   fn from(color: Color) -> Self {
      Rgba([color.r, color.g, color.b, color.a])
   }
}

impl From<Color> for Rgb<u8> {
   fn from(color: Color) -> Self {
      Rgb([color.r, color.g, color.b])
   }
}
