use serde::{Deserialize, Serialize};

/// Axis-aligned face box in image pixel coordinates: `(x1, y1)` top-left,
/// `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// `(x2 - x1) * (y2 - y1)`. Degenerate boxes have zero area.
    pub fn area(&self) -> f32 {
        (self.width() * self.height()).max(0.0)
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// L2 norm of the raw vector.
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Unit-length copy. A zero vector is returned unchanged.
    pub fn normalized(&self) -> Vec<f32> {
        let norm = self.norm();
        if norm > 0.0 {
            self.values.iter().map(|v| v / norm).collect()
        } else {
            self.values.clone()
        }
    }
}

/// A face found by a [`FaceLocator`](crate::FaceLocator).
///
/// Immutable once produced; lives for one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub bbox: BoundingBox,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
    /// Identity embedding, present when the locator ran a recognizer.
    pub embedding: Option<Embedding>,
}

impl Face {
    pub fn area(&self) -> f32 {
        self.bbox.area()
    }
}

/// Pixel rectangle from the fast cosmetic detector, clamped to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Clamp a possibly out-of-bounds rectangle to a `width` × `height` image.
    ///
    /// Returns `None` when nothing of the rectangle remains inside.
    pub fn clamped(x: i64, y: i64, w: i64, h: i64, width: u32, height: u32) -> Option<Self> {
        let x0 = x.clamp(0, width as i64);
        let y0 = y.clamp(0, height as i64);
        let x1 = (x + w).clamp(0, width as i64);
        let y1 = (y + h).clamp(0, height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Sort faces ascending by left edge. Stable for equal `x1`.
pub fn sort_left_to_right(faces: &mut [Face]) {
    faces.sort_by(|a, b| {
        a.bbox
            .x1
            .partial_cmp(&b.bbox.x1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// The face with the largest bounding-box area.
///
/// Ties go to the earliest face in list order. Returns `None` for an empty list.
pub fn largest(faces: &[Face]) -> Option<&Face> {
    let mut best: Option<&Face> = None;
    for face in faces {
        match best {
            Some(b) if face.area() <= b.area() => {}
            _ => best = Some(face),
        }
    }
    best
}
