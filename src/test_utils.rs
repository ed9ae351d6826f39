//! Test utilities for building ILDA data and sample frames
//!
//! Shared by unit tests, integration tests and benches so that fixtures are
//! generated in code instead of checked in as binary files.

#![cfg(any(test, feature = "benchmark"))]

use std::path::PathBuf;

use crate::ilda::{IldaFormat, SectionHeader};
use crate::types::{Frame, Point, Rgb};

/// Builds ILDA byte streams section by section.
///
/// Frame sections are numbered in the order they are added and `build`
/// fills in the total frame count.
#[derive(Debug, Default)]
pub struct IldaBuilder {
    sections: Vec<(SectionHeader, Vec<u8>)>,
    frames: u16,
}

impl IldaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format 2 section.
    pub fn palette(self, name: &str, colors: &[Rgb]) -> Self {
        let body = colors.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
        self.section(IldaFormat::Palette, name, colors.len(), body)
    }

    /// Format 1 section of `(x, y, status, color_index)` records.
    pub fn indexed_2d(self, name: &str, points: &[(i16, i16, u8, u8)]) -> Self {
        let mut body = Vec::new();
        for &(x, y, status, index) in points {
            body.extend_from_slice(&x.to_be_bytes());
            body.extend_from_slice(&y.to_be_bytes());
            body.extend_from_slice(&[status, index]);
        }
        self.section(IldaFormat::Indexed2d, name, points.len(), body)
    }

    /// Format 0 section of `(x, y, z, status, color_index)` records.
    pub fn indexed_3d(self, name: &str, points: &[(i16, i16, i16, u8, u8)]) -> Self {
        let mut body = Vec::new();
        for &(x, y, z, status, index) in points {
            body.extend_from_slice(&x.to_be_bytes());
            body.extend_from_slice(&y.to_be_bytes());
            body.extend_from_slice(&z.to_be_bytes());
            body.extend_from_slice(&[status, index]);
        }
        self.section(IldaFormat::Indexed3d, name, points.len(), body)
    }

    /// Format 5 section of `(x, y, status, color)` records.
    pub fn truecolor_2d(self, name: &str, points: &[(i16, i16, u8, Rgb)]) -> Self {
        let mut body = Vec::new();
        for &(x, y, status, color) in points {
            body.extend_from_slice(&x.to_be_bytes());
            body.extend_from_slice(&y.to_be_bytes());
            body.extend_from_slice(&[status, color.b, color.g, color.r]);
        }
        self.section(IldaFormat::TrueColor2d, name, points.len(), body)
    }

    /// Format 4 section of `(x, y, z, status, color)` records.
    pub fn truecolor_3d(self, name: &str, points: &[(i16, i16, i16, u8, Rgb)]) -> Self {
        let mut body = Vec::new();
        for &(x, y, z, status, color) in points {
            body.extend_from_slice(&x.to_be_bytes());
            body.extend_from_slice(&y.to_be_bytes());
            body.extend_from_slice(&z.to_be_bytes());
            body.extend_from_slice(&[status, color.b, color.g, color.r]);
        }
        self.section(IldaFormat::TrueColor3d, name, points.len(), body)
    }

    /// A section with an arbitrary format code and declared record count.
    pub fn raw_section(mut self, format_code: u8, name: &str, record_count: u16, body: &[u8]) -> Self {
        let header = SectionHeader {
            format_code,
            name: name.to_string(),
            company: "test".to_string(),
            record_count,
            frame_index: self.frames,
            total_frames: 0,
            projector: 0,
        };
        self.frames += 1;
        self.sections.push((header, body.to_vec()));
        self
    }

    fn section(mut self, format: IldaFormat, name: &str, records: usize, body: Vec<u8>) -> Self {
        let mut header = SectionHeader::new(format, name, records as u16);
        header.company = "test".to_string();
        if !format.is_palette() {
            header.frame_index = self.frames;
            self.frames += 1;
        }
        self.sections.push((header, body));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let total = self.frames;
        let mut out = Vec::new();
        for (mut header, body) in self.sections {
            if header.format() != Some(IldaFormat::Palette) {
                header.total_frames = total;
            }
            out.extend_from_slice(&header.to_bytes());
            out.extend_from_slice(&body);
        }
        out
    }

    /// Three frames: a red square, a palette-colored 3D line after a palette
    /// section, and a corner-to-corner jump.
    pub fn sample_show() -> Vec<u8> {
        let red = Rgb::new(255, 0, 0);
        Self::new()
            .truecolor_2d(
                "square",
                &[
                    (-1000, -1000, Point::BLANKING_BIT, red),
                    (1000, -1000, 0, red),
                    (1000, 1000, 0, red),
                    (-1000, 1000, 0, red),
                    (-1000, -1000, Point::LAST_POINT_BIT, red),
                ],
            )
            .palette("pal", &[Rgb::new(0, 255, 0), Rgb::new(0, 0, 255)])
            .indexed_3d("line", &[(0, 0, 0, 0, 0), (500, 500, 250, 0x80, 1)])
            .truecolor_2d("jump", &[(0, 0, 0x40, Rgb::WHITE), (32767, -32768, 0x80, Rgb::WHITE)])
            .build()
    }
}

/// `n` truecolor frames; frame `i` has `150 + 10 * i` points on a spiral with
/// every tenth point blanked.
pub fn sample_frames(n: usize) -> Vec<Frame> {
    (0..n)
        .map(|i| {
            let count = 150 + 10 * i;
            let points = (0..count)
                .map(|j| {
                    let angle = j as f64 * 0.25;
                    let radius = 200.0 * j as f64;
                    let status = if j % 10 == 0 { Point::BLANKING_BIT } else { 0 };
                    Point::new(
                        (radius * angle.cos()).clamp(-32768.0, 32767.0) as i16,
                        (radius * angle.sin()).clamp(-32768.0, 32767.0) as i16,
                        0,
                        status,
                        Rgb::new((j * 7 % 256) as u8, 128, 255),
                    )
                })
                .collect::<Vec<_>>();
            let mut header =
                SectionHeader::new(IldaFormat::TrueColor2d, format!("f{i}"), count as u16);
            header.frame_index = i as u16;
            header.total_frames = n as u16;
            Frame::new(IldaFormat::TrueColor2d, points, header)
        })
        .collect()
}

/// Write `data` to a file in the system temp directory and return its path.
pub fn write_temp_file(name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("lasercast-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    std::fs::write(&path, data)?;
    Ok(path)
}
