//! Streaming PNG export
//!
//! [`PngWriter`] consumes scanlines from a [`LineInterpreter`] and encodes
//! them as they arrive, so the full raster is never held in memory. Heights
//! go to a 16-bit grayscale image (big-endian samples), colors to an 8-bit
//! RGB image.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use png::{BitDepth, ColorType, Compression, Encoder, StreamWriter};
use terra_core::{LineInterpreter, LineObserver};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::project::{HeightRange, Project};

type RowStream = StreamWriter<'static, BufWriter<File>>;

fn open_stream(
    path: &Path,
    width: usize,
    height: usize,
    color: ColorType,
    depth: BitDepth,
) -> Result<RowStream> {
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = Encoder::new(file, width as u32, height as u32);
    encoder.set_color(color);
    encoder.set_depth(depth);
    encoder.set_compression(Compression::Best);
    Ok(encoder.write_header()?.into_stream_writer()?)
}

/// Writes a height PNG and a color PNG one row at a time.
///
/// Encoding errors cannot be returned through [`LineObserver::observe`], so
/// the first one is kept, later rows are dropped, and [`PngWriter::finish`]
/// reports it. Dropping an unfinished writer finalizes both files and only
/// logs failures.
pub struct PngWriter {
    width: usize,
    height: usize,
    range: HeightRange,
    height_stream: Option<RowStream>,
    color_stream: Option<RowStream>,
    height_row: Vec<u8>,
    color_row: Vec<u8>,
    rows_written: usize,
    error: Option<Error>,
}

impl PngWriter {
    pub fn create(
        width: usize,
        height: usize,
        height_path: impl AsRef<Path>,
        color_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let (height_path, color_path) = (height_path.as_ref(), color_path.as_ref());
        let height_stream =
            open_stream(height_path, width, height, ColorType::Grayscale, BitDepth::Sixteen)?;
        let color_stream =
            open_stream(color_path, width, height, ColorType::Rgb, BitDepth::Eight)?;
        debug!(
            width,
            height,
            height_path = %height_path.display(),
            color_path = %color_path.display(),
            "png streams opened"
        );

        Ok(Self {
            width,
            height,
            range: HeightRange::default(),
            height_stream: Some(height_stream),
            color_stream: Some(color_stream),
            height_row: vec![0; width * 2],
            color_row: vec![0; width * 3],
            rows_written: 0,
            error: None,
        })
    }

    /// Heights in `[min, max]` span the full 16-bit range.
    pub fn set_height_range(&mut self, min: f32, max: f32) -> Result<()> {
        self.range = HeightRange::new(min, max)?;
        Ok(())
    }

    pub fn height_range(&self) -> HeightRange {
        self.range
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn write_row(&mut self, row: &[f32]) -> Result<()> {
        let expected = self.width * 4;
        if row.len() != expected {
            return Err(Error::RowLength { expected, actual: row.len() });
        }

        for (i, px) in row.chunks_exact(4).enumerate() {
            BigEndian::write_u16(&mut self.height_row[i * 2..], self.range.quantize(px[0]));
            self.color_row[i * 3] = px[1] as u8;
            self.color_row[i * 3 + 1] = px[2] as u8;
            self.color_row[i * 3 + 2] = px[3] as u8;
        }

        if let Some(stream) = self.height_stream.as_mut() {
            stream.write_all(&self.height_row)?;
        }
        if let Some(stream) = self.color_stream.as_mut() {
            stream.write_all(&self.color_row)?;
        }
        self.rows_written += 1;
        Ok(())
    }

    fn finish_streams(&mut self) -> Result<()> {
        let height = self.height_stream.take().map(StreamWriter::finish);
        let color = self.color_stream.take().map(StreamWriter::finish);
        height.transpose()?;
        color.transpose()?;
        Ok(())
    }

    /// Finalizes both images, reporting the first error seen while writing.
    pub fn finish(mut self) -> Result<()> {
        if let Some(e) = self.error.take() {
            let _ = self.finish_streams();
            return Err(e);
        }
        self.finish_streams()?;
        info!(width = self.width, rows = self.rows_written, "png export finished");
        Ok(())
    }
}

impl LineObserver for PngWriter {
    fn observe(&mut self, row: &[f32]) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_row(row) {
            warn!(error = %e, row = self.rows_written, "png row dropped");
            self.error = Some(e);
        }
    }
}

impl Drop for PngWriter {
    fn drop(&mut self) {
        if self.height_stream.is_none() && self.color_stream.is_none() {
            return;
        }
        if self.rows_written != self.height {
            warn!(
                rows = self.rows_written,
                expected = self.height,
                "png writer dropped before the last row"
            );
        }
        if let Err(e) = self.finish_streams() {
            warn!(error = %e, "png streams not finalized");
        }
    }
}

/// Renders `project` with a scanline pass straight into its two output files.
pub fn export_project(project: &Project) -> Result<()> {
    project.validate()?;
    let (width, height) = (project.resolution.width, project.resolution.height);
    let (height_expr, color_expr) = project.expressions();

    let outputs = &project.outputs;
    let mut writer = PngWriter::create(width, height, &outputs.height, &outputs.color)?;
    writer.set_height_range(project.height_range.min, project.height_range.max)?;

    info!(
        width,
        height,
        height_preset = ?project.height,
        color_preset = ?project.color,
        "exporting terrain"
    );

    let mut interpreter = LineInterpreter::new(width, height, &mut writer);
    interpreter.set_height_expr(&height_expr)?;
    interpreter.set_color_expr(&color_expr)?;
    interpreter.execute()?;
    debug!(rows = interpreter.observer().rows_written(), "scanlines encoded");

    writer.finish()
}
