use crate::types::*;
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCRATCH_PREFIX: &str = ".pdf2slides-";

/// Stages rendered pages on disk for embedding.
///
/// All page images live in a private scratch directory created per run.
/// The directory is removed when the processor is dropped, which covers
/// early returns on error as well as normal completion.
pub struct ImageProcessor {
    scratch: TempDir,
}

impl ImageProcessor {
    pub fn new(config: &ConvertConfig) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);

        let scratch = match &config.scratch_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        log::debug!("Scratch directory: {}", scratch.path().display());
        Ok(Self { scratch })
    }

    #[cfg(test)]
    fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Encode a rendered page as PNG. The file name carries the page index.
    pub fn write_page(&self, index: usize, image: &DynamicImage) -> Result<PathBuf> {
        let path = self.scratch.path().join(format!("page-{}.png", index));
        let mut writer = BufWriter::new(File::create(&path)?);

        image.write_to(&mut writer, ImageFormat::Png)?;
        writer.into_inner().map_err(|e| e.into_error())?;

        log::debug!(
            "Page {} staged: {}x{} px at {}",
            index + 1,
            image.width(),
            image.height(),
            path.display()
        );
        Ok(path)
    }

    pub fn discard(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }
}
