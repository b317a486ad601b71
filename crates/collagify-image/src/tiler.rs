use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, Rgb, RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::layout::Grid;

pub const JPEG_QUALITY: u8 = 100;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Error)]
pub enum TileError {
    #[error("decode image {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: ImageError,
    },

    #[error("encode collage: {0}")]
    Encode(#[source] ImageError),

    #[error("{rows}x{cols} grid cannot hold {count} images")]
    GridTooSmall { rows: u32, cols: u32, count: usize },

    #[error("collage canvas dimensions overflow")]
    CanvasTooLarge,
}

/// Tile encoded images into a `rows × cols` grid and return the collage as
/// JPEG bytes. An empty input yields `Ok(None)`.
///
/// The first image sets the cell size. Images are placed row-major in input
/// order; unfilled cells stay white.
pub fn concat<B: AsRef<[u8]>>(
    images: &[B],
    rows: u32,
    cols: u32,
) -> Result<Option<Vec<u8>>, TileError> {
    if images.is_empty() {
        return Ok(None);
    }

    let grid = Grid { rows, cols };
    if grid.capacity() < images.len() as u64 {
        return Err(TileError::GridTooSmall {
            rows,
            cols,
            count: images.len(),
        });
    }

    let decoded = images
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            image::load_from_memory(bytes.as_ref())
                .map(|img| img.to_rgb8())
                .map_err(|source| TileError::Decode { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let canvas = compose(&decoded, grid)?;
    encode(&canvas).map(Some)
}

fn compose(images: &[RgbImage], grid: Grid) -> Result<RgbImage, TileError> {
    let Some(first) = images.first() else {
        return Ok(RgbImage::new(0, 0));
    };
    let (cell_w, cell_h) = first.dimensions();

    let width = grid.cols.checked_mul(cell_w).ok_or(TileError::CanvasTooLarge)?;
    let height = grid.rows.checked_mul(cell_h).ok_or(TileError::CanvasTooLarge)?;

    debug!(
        "Composing {} images into {}x{} grid ({}x{} px)",
        images.len(),
        grid.rows,
        grid.cols,
        width,
        height
    );

    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

    for (index, img) in (0u32..).zip(images) {
        let (row, col) = grid.cell(index);
        let x = i64::from(col) * i64::from(cell_w);
        let y = i64::from(row) * i64::from(cell_h);

        // oversized images are clipped to their cell
        let cell = imageops::crop_imm(img, 0, 0, cell_w, cell_h).to_image();
        imageops::replace(&mut canvas, &cell, x, y);
    }

    Ok(canvas)
}

fn encode(canvas: &RgbImage) -> Result<Vec<u8>, TileError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(canvas)
        .map_err(TileError::Encode)?;
    Ok(buf)
}
