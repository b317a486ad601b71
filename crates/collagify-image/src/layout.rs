/// Rows × columns of a collage grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub rows: u32,
    pub cols: u32,
}

/// Widest row a collage is allowed to have.
pub const MAX_COLS: u32 = 5;

impl Grid {
    /// Layout for `count` images: `cols = min(max_cols, count)`,
    /// `rows = ceil(count / cols)`. `None` when there is nothing to tile.
    pub fn for_count(count: usize, max_cols: u32) -> Option<Self> {
        let count = u32::try_from(count).ok()?;
        if count == 0 || max_cols == 0 {
            return None;
        }

        let cols = count.min(max_cols);
        Some(Self {
            rows: count.div_ceil(cols),
            cols,
        })
    }

    pub fn capacity(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.cols)
    }

    /// Row-major cell for the `index`th image: `(row, col)`.
    pub fn cell(&self, index: u32) -> (u32, u32) {
        (index / self.cols, index % self.cols)
    }
}
