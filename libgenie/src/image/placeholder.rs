//! Locally rendered fallback image
//!
//! A blue gradient with a small network of nodes and a few halo rings,
//! encoded as PNG. The decoration is seeded from the title, so the same
//! title always yields the same bytes.

use std::io;

use png::{BitDepth, ColorType, Encoder, EncodingError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const NODE_COUNT: usize = 20;
const RING_COUNT: usize = 8;
const MAX_EDGE_LENGTH: f64 = 300.0;

type Rgb = [u8; 3];

const EDGE_COLOR: Rgb = [180, 220, 255];
const NODE_COLOR: Rgb = [220, 240, 255];
const WHITE: Rgb = [255, 255, 255];
const BAND_COLOR: Rgb = [0, 0, 0];

#[derive(Debug, Clone, Copy)]
pub struct PlaceholderImage {
    width: u32,
    height: u32,
}

impl PlaceholderImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Render and PNG-encode an image for `title`
    pub fn render(&self, title: &str) -> io::Result<Vec<u8>> {
        let mut canvas = Canvas::new(self.width, self.height);
        let mut rng = StdRng::seed_from_u64(title_seed(title));

        canvas.gradient();
        canvas.network(&mut rng);
        canvas.rings(&mut rng);
        canvas.caption_band();

        encode_png(self.width, self.height, &canvas.pixels)
    }
}

/// FNV-1a over the title bytes
fn title_seed(title: &str) -> u64 {
    title.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 3],
        }
    }

    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 3)
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i..i + 3].copy_from_slice(&color);
        }
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: f64) {
        if let Some(i) = self.offset(x, y) {
            for (channel, target) in self.pixels[i..i + 3].iter_mut().zip(color) {
                let mixed = f64::from(*channel) * (1.0 - alpha) + f64::from(target) * alpha;
                *channel = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    /// Dark blue at the top left shading to teal at the bottom right
    fn gradient(&mut self) {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        for y in 0..self.height {
            let fy = f64::from(y) / h;
            let r = 20.0 + 50.0 * (1.0 - fy);
            let g = 40.0 + 80.0 * fy;
            let b = 80.0 + 120.0 * fy;
            for x in 0..self.width {
                let fx = f64::from(x) / w;
                let color = [(r + 20.0 * fx) as u8, (g + 10.0 * fx) as u8, b as u8];
                self.put(i64::from(x), i64::from(y), color);
            }
        }
    }

    fn network(&mut self, rng: &mut StdRng) {
        let margin = 50.min(i64::from(self.width.min(self.height)) / 4);
        let nodes: Vec<(i64, i64, i64)> = (0..NODE_COUNT)
            .map(|_| {
                (
                    rng.gen_range(margin..=i64::from(self.width) - margin),
                    rng.gen_range(margin..=i64::from(self.height) - margin),
                    rng.gen_range(5..=15),
                )
            })
            .collect();

        for (i, &(x1, y1, _)) in nodes.iter().enumerate() {
            for &(x2, y2, _) in nodes.iter().skip(i + 1).take(3) {
                let dist = (((x2 - x1).pow(2) + (y2 - y1).pow(2)) as f64).sqrt();
                if dist < MAX_EDGE_LENGTH {
                    self.line(x1, y1, x2, y2, EDGE_COLOR, 0.5);
                }
            }
        }

        for &(x, y, r) in &nodes {
            self.disc(x, y, r, NODE_COLOR);
            self.ring(x, y, r, 1, WHITE, 1.0);
        }
    }

    fn rings(&mut self, rng: &mut StdRng) {
        for _ in 0..RING_COUNT {
            let x = rng.gen_range(0..=i64::from(self.width));
            let y = rng.gen_range(0..=i64::from(self.height));
            let size = rng.gen_range(50..=150);
            let mut r = size;
            while r > 0 {
                let opacity = 0.4 * r as f64 / size as f64;
                self.ring(x, y, r, 2, WHITE, opacity);
                r -= 10;
            }
        }
    }

    /// Translucent strip along the bottom edge
    fn caption_band(&mut self) {
        let band = (self.height / 3).min(200);
        for y in self.height - band..self.height {
            for x in 0..self.width {
                self.blend(i64::from(x), i64::from(y), BAND_COLOR, 0.6);
            }
        }
    }

    fn line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb, alpha: f64) {
        let steps = (x2 - x1).abs().max((y2 - y1).abs()).max(1);
        for step in 0..=steps {
            let t = step as f64 / steps as f64;
            let x = x1 as f64 + (x2 - x1) as f64 * t;
            let y = y1 as f64 + (y2 - y1) as f64 * t;
            self.blend(x.round() as i64, y.round() as i64, color, alpha);
        }
    }

    fn disc(&mut self, cx: i64, cy: i64, r: i64, color: Rgb) {
        for y in cy - r..=cy + r {
            for x in cx - r..=cx + r {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                    self.put(x, y, color);
                }
            }
        }
    }

    fn ring(&mut self, cx: i64, cy: i64, r: i64, thickness: i64, color: Rgb, alpha: f64) {
        let inner = (r - thickness).max(0).pow(2);
        let outer = r * r;
        for y in cy - r..=cy + r {
            for x in cx - r..=cx + r {
                let d = (x - cx).pow(2) + (y - cy).pow(2);
                if d > inner && d <= outer {
                    self.blend(x, y, color, alpha);
                }
            }
        }
    }
}

/// Encode 8-bit RGB pixels as a PNG
fn encode_png(width: u32, height: u32, rgb: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, width, height);
    encoder.set_color(ColorType::Rgb);
    encoder.set_depth(BitDepth::Eight);

    let mut writer = encoder.write_header().map_err(encoding_error)?;
    writer.write_image_data(rgb).map_err(encoding_error)?;
    writer.finish().map_err(encoding_error)?;
    Ok(out)
}

fn encoding_error(e: EncodingError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}
