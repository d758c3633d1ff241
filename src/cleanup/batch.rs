/// Folder-level cleanup pass
///
/// Reads every supported image in the input folder, removes its
/// background, flattens it onto a solid color and writes it under the
/// same file name in the output folder.

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::composite::{flatten_onto, BackgroundColor};
use super::matte::BackgroundRemover;
use crate::error::{Error, Result};

/// Extensions accepted as input images (compared lowercase)
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Options for one cleanup run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOptions {
    pub background: BackgroundColor,
    /// Log and count failing files instead of aborting the run
    pub keep_going: bool,
    /// Leave files that already have an output alone
    pub skip_existing: bool,
}

/// Result of a cleanup run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// True for .png/.jpg/.jpeg, case-insensitive
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map_or(false, |ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Regular files directly inside `folder`, sorted by file name
pub fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(Error::FolderNotFound(folder.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(folder).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            Error::io(path, source)
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Supported images directly inside `folder`, sorted by file name
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_files(folder)?
        .into_iter()
        .filter(|path| is_supported_image(path))
        .collect())
}

/// Decode an image and turn it upright according to its EXIF orientation
pub fn open_upright(path: &Path) -> Result<DynamicImage> {
    let mut decoder = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| Error::io(path, e))?
        .into_decoder()
        .map_err(|e| Error::image(path, e))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder).map_err(|e| Error::image(path, e))?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Clean one image: remove background, flatten, save to `output_path`
pub fn clean_image<R: BackgroundRemover + ?Sized>(
    remover: &mut R,
    input_path: &Path,
    output_path: &Path,
    background: BackgroundColor,
) -> Result<()> {
    let source = open_upright(input_path)?.to_rgb8();

    let cutout = remover.remove(&source)?;
    let flattened = flatten_onto(&cutout, background);

    DynamicImage::ImageRgb8(flattened)
        .save(output_path)
        .map_err(|e| Error::image(output_path, e))
}

/// Run the cleanup pass over `input` and write results into `output`
pub fn clean_folder<R: BackgroundRemover + ?Sized>(
    remover: &mut R,
    input: &Path,
    output: &Path,
    options: CleanupOptions,
) -> Result<CleanupReport> {
    if !input.is_dir() {
        return Err(Error::FolderNotFound(input.to_path_buf()));
    }

    fs::create_dir_all(output).map_err(|e| Error::io(output, e))?;

    let same = fs::canonicalize(input).map_err(|e| Error::io(input, e))?
        == fs::canonicalize(output).map_err(|e| Error::io(output, e))?;
    if same {
        return Err(Error::SameFolder(output.to_path_buf()));
    }

    let images = list_images(input)?;
    tracing::info!(
        "🔍 Found {} images in {} (background {})",
        images.len(),
        input.display(),
        options.background
    );

    let mut report = CleanupReport::default();
    for input_path in images {
        let Some(file_name) = input_path.file_name() else {
            continue;
        };
        let output_path = output.join(file_name);
        let name = file_name.to_string_lossy();

        if options.skip_existing && output_path.exists() {
            tracing::debug!("⏭️  Skipping {} (output exists)", name);
            report.skipped += 1;
            continue;
        }

        match clean_image(remover, &input_path, &output_path, options.background) {
            Ok(()) => {
                tracing::info!("Processed: {}", name);
                report.processed += 1;
            }
            Err(e) if options.keep_going => {
                tracing::warn!("⚠️  Failed {}: {}", name, e);
                report.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        "✅ Cleanup complete: {} processed, {} skipped, {} failed",
        report.processed,
        report.skipped,
        report.failed
    );

    Ok(report)
}
