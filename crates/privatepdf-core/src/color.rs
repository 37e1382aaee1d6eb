//! CSS color string handling for text overlays

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref RGB_COMPONENTS: Regex = Regex::new(r"(\d+), (\d+), (\d+)").unwrap();
}

/// An RGB color. Components are either in `[0, 255]` (as parsed) or in
/// `[0, 1]` (after [`Rgb::normalize`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        red: 0.0,
        green: 0.0,
        blue: 0.0,
    };

    /// Scale every component from `[0, 255]` down to `[0, 1]`
    pub fn normalize(self) -> Rgb {
        Rgb {
            red: self.red / 255.0,
            green: self.green / 255.0,
            blue: self.blue / 255.0,
        }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}

/// Decompose strings like `"rgb(2, 255, 0)"` into their components
pub fn parse_rgb(rgb: &str) -> Option<Rgb> {
    let caps = RGB_COMPONENTS.captures(rgb)?;
    let component = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
    Some(Rgb {
        red: component(1)?,
        green: component(2)?,
        blue: component(3)?,
    })
}

/// Parse a computed CSS color and normalize it, falling back to black
pub fn text_color_from_css(css: &str) -> Rgb {
    parse_rgb(css).unwrap_or(Rgb::BLACK).normalize()
}
