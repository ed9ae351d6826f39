//! ILDA file decoding
//!
//! Decoding never fails on content. A short header, a foreign magic, an
//! unsupported format code or a short section body all end the decode, and
//! whatever was decoded before that point is returned.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use lasercast::ilda::IldaFile;
//!
//! fn list_frames() -> lasercast::Result<()> {
//!     let file = IldaFile::open("show.ild")?;
//!     for (index, frame) in file.frames().iter().enumerate() {
//!         println!("{index}: {} ({} points)", frame.name(), frame.point_count());
//!     }
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::format::{HEADER_SIZE, IldaFormat, SectionHeader, parse_palette_entry};
use crate::types::{Frame, Palette};
use crate::{LaserError, Result};

/// Output of a decode: frames in file order plus the palette as it stood at
/// the end of the file.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub frames: Vec<Frame>,
    pub palette: Palette,
}

/// Decode a whole ILDA buffer, starting from the default palette.
pub fn decode(data: &[u8]) -> Decoded {
    decode_with_palette(data, Palette::default())
}

/// Decode a whole ILDA buffer, starting from `palette`.
///
/// Palette sections update the palette in place; every indexed frame after
/// them resolves colors against the updated table.
pub fn decode_with_palette(data: &[u8], mut palette: Palette) -> Decoded {
    let mut frames = Vec::new();
    let mut offset = 0usize;

    while let Some(header) = data.get(offset..).and_then(SectionHeader::parse) {
        offset += HEADER_SIZE;

        let Some(format) = header.format() else {
            warn!(
                format_code = header.format_code,
                offset = offset - HEADER_SIZE,
                "Unsupported ILDA format, stopping decode"
            );
            break;
        };

        let declared = header.record_count as usize;
        let record_size = format.record_size();
        let available = (data.len() - offset) / record_size;
        let records = declared.min(available);
        if records < declared {
            warn!(
                section = %header.name,
                declared,
                available = records,
                "ILDA section truncated"
            );
        }

        let body = &data[offset..offset + records * record_size];
        offset += records * record_size;

        if format.is_palette() {
            let mut applied = 0usize;
            for (index, record) in body.chunks_exact(record_size).enumerate() {
                if parse_palette_entry(record).is_some_and(|color| palette.set(index, color)) {
                    applied += 1;
                }
            }
            debug!(section = %header.name, entries = applied, "Applied ILDA palette");
        } else {
            let points: Vec<_> = body
                .chunks_exact(record_size)
                .filter_map(|record| format.parse_point(record, &palette))
                .collect();
            debug!(
                section = %header.name,
                format = ?format,
                points = points.len(),
                "Decoded ILDA frame"
            );
            frames.push(Frame::new(format, points, header));
        }

        if records < declared {
            break;
        }
    }

    trace!(frames = frames.len(), consumed = offset, total = data.len(), "ILDA decode finished");
    Decoded { frames, palette }
}

/// A decoded ILDA file.
///
/// Frames are shared behind an `Arc<[Frame]>` so that a playback clock and a
/// transmitter can hold them without copying.
#[derive(Debug, Clone)]
pub struct IldaFile {
    path: PathBuf,
    frames: Arc<[Frame]>,
    palette: Palette,
}

impl IldaFile {
    /// Read and decode a file.
    ///
    /// Only I/O fails. A file that decodes to zero frames opens successfully
    /// and logs a warning.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| LaserError::file_error(path, e))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|e| LaserError::file_error(path, e))?;

        let file = Self::from_bytes_with_path(&data, path.to_path_buf());
        if file.is_empty() {
            warn!(path = %path.display(), "ILDA file contains no frames");
        } else {
            info!(path = %path.display(), frames = file.frame_count(), "Opened ILDA file");
        }
        Ok(file)
    }

    /// Decode an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_bytes_with_path(data, PathBuf::from("<memory>"))
    }

    fn from_bytes_with_path(data: &[u8], path: PathBuf) -> Self {
        let Decoded { frames, palette } = decode(data);
        Self { path, frames: frames.into(), palette }
    }

    pub fn frames(&self) -> &Arc<[Frame]> {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Palette after the last palette section in the file.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// File name without directories, for status display.
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Count of frames that use a given layout.
    pub fn count_format(&self, format: IldaFormat) -> usize {
        self.frames.iter().filter(|f| f.format == format).count()
    }
}
