use ndarray::prelude::*;

/// Per-pixel class indices, indexed `[row, col]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    classes: Array2<u32>,
}

impl Mask {
    pub fn new(classes: Array2<u32>) -> Self {
        Self { classes }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u32) -> Self {
        let classes =
            Array2::from_shape_fn((height as usize, width as usize), |(y, x)| f(x as u32, y as u32));
        Self { classes }
    }

    pub fn filled(width: u32, height: u32, class: u32) -> Self {
        Self::new(Array2::from_elem((height as usize, width as usize), class))
    }

    pub fn width(&self) -> u32 {
        self.classes.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.classes.nrows() as u32
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.classes[[y as usize, x as usize]]
    }

    pub fn classes(&self) -> ArrayView2<'_, u32> {
        self.classes.view()
    }

    /// Nearest-neighbour resize; class indices must never be interpolated.
    pub fn resize_nearest(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        let (src_w, src_h) = (self.classes.ncols(), self.classes.nrows());
        let classes = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            let sy = (y * src_h / height as usize).min(src_h - 1);
            let sx = (x * src_w / width as usize).min(src_w - 1);
            self.classes[[sy, sx]]
        });
        Self { classes }
    }
}
