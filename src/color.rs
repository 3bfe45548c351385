//! Display-color assignment for clouds.
//!
//! A small value-type palette replaces any process-wide rotating color
//! state: the caller owns one palette and draws from it when constructing
//! clouds.

use serde::{Deserialize, Serialize};

/// Round-robin palette used to tint successive clouds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorPalette {
    colors: Vec<[f32; 3]>,
    next: usize,
}

impl ColorPalette {
    /// The stock 8-entry sRGB palette.
    pub fn standard() -> Self {
        Self::new(vec![
            [240.0 / 255.0, 200.0 / 255.0, 0.0],
            [126.0 / 255.0, 240.0 / 255.0, 191.0 / 255.0],
            [255.0 / 255.0, 219.0 / 255.0, 177.0 / 255.0],
            [157.0 / 255.0, 157.0 / 255.0, 255.0 / 255.0],
            [220.0 / 255.0, 255.0 / 255.0, 119.0 / 255.0],
            [201.0 / 255.0, 151.0 / 255.0, 255.0 / 255.0],
            [153.0 / 255.0, 255.0 / 255.0, 251.0 / 255.0],
            [180.0 / 255.0, 208.0 / 255.0, 255.0 / 255.0],
        ])
    }

    pub fn new(colors: Vec<[f32; 3]>) -> Self {
        Self { colors, next: 0 }
    }

    /// Next color in rotation; white when the palette is empty.
    pub fn next(&mut self) -> [f32; 3] {
        if self.colors.is_empty() {
            return [1.0, 1.0, 1.0];
        }
        let color = self.colors[self.next % self.colors.len()];
        self.next = self.next.wrapping_add(1);
        color
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::standard()
    }
}
