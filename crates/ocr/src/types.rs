use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axis-aligned word box in pixel coordinates, serialized as `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Collapse a four-corner polygon to its enclosing rectangle.
    /// Negative coordinates clamp to zero.
    pub fn from_quad(points: &[[f32; 2]; 4]) -> Self {
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for [x, y] in points {
            min_x = min_x.min(*x);
            min_y = min_y.min(*y);
            max_x = max_x.max(*x);
            max_y = max_y.max(*y);
        }
        Self::new(min_x as u32, min_y as u32, max_x as u32, max_y as u32)
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from([x0, y0, x1, y1]: [u32; 4]) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutInputError {
    #[error("No text provided.")]
    Empty,
    #[error("words ({words}) and boxes ({boxes}) count mismatch")]
    CountMismatch { words: usize, boxes: usize },
}

/// Words with one box each, ready for the layout model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutInput {
    words: Vec<String>,
    boxes: Vec<BoundingBox>,
}

impl LayoutInput {
    pub fn new(words: Vec<String>, boxes: Vec<BoundingBox>) -> Result<Self, LayoutInputError> {
        if words.is_empty() || boxes.is_empty() {
            return Err(LayoutInputError::Empty);
        }
        if words.len() != boxes.len() {
            return Err(LayoutInputError::CountMismatch {
                words: words.len(),
                boxes: boxes.len(),
            });
        }
        Ok(Self { words, boxes })
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
