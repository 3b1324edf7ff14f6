//! Directory-backed gallery loading.
//!
//! Layout: one subdirectory per identity, image files inside. Every image
//! is converted to grayscale, resized to a common size, and flattened
//! row-major to `[0, 1]` doubles. Unreadable files are skipped with a
//! warning; classes below the minimum sample count are dropped and the
//! class table is compacted to the survivors.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::GrayImage;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

// ── Configuration ────────────────────────────────────────────────────────

/// Configuration for directory gallery loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Target `[width, height]` every image is brought to.
    /// Default: [`DatasetConfig::DEFAULT_IMAGE_SIZE`].
    #[serde(default = "DatasetConfig::default_image_size")]
    pub image_size: [u32; 2],
    /// Classes with fewer usable images than this are dropped.
    /// Default: [`DatasetConfig::DEFAULT_MIN_IMAGES_PER_CLASS`].
    #[serde(default = "DatasetConfig::default_min_images_per_class")]
    pub min_images_per_class: usize,
}

impl DatasetConfig {
    pub const DEFAULT_IMAGE_SIZE: [u32; 2] = [64, 64];
    pub const DEFAULT_MIN_IMAGES_PER_CLASS: usize = 10;

    fn default_image_size() -> [u32; 2] {
        Self::DEFAULT_IMAGE_SIZE
    }

    fn default_min_images_per_class() -> usize {
        Self::DEFAULT_MIN_IMAGES_PER_CLASS
    }

    /// Flattened vector length implied by `image_size`, computed in `usize`
    /// so oversized targets cannot wrap.
    pub fn dim(&self) -> usize {
        self.image_size[0] as usize * self.image_size[1] as usize
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            image_size: Self::DEFAULT_IMAGE_SIZE,
            min_images_per_class: Self::DEFAULT_MIN_IMAGES_PER_CLASS,
        }
    }
}

// ── Dataset types ────────────────────────────────────────────────────────

/// One flattened gallery image.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Row-major pixels in `[0, 1]`, length `width * height`.
    pub vector: DVector<f64>,
    /// Index into [`Dataset::classes`].
    pub class: usize,
}

/// An in-memory gallery: class names plus flattened samples.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Class names in directory name order; `Sample::class` indexes here.
    pub classes: Vec<String>,
    /// Flattened vector length (`width * height`).
    pub dim: usize,
    pub samples: Vec<Sample>,
}

impl Dataset {
    /// Sample counts parallel to [`Dataset::classes`].
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for sample in &self.samples {
            counts[sample.class] += 1;
        }
        counts
    }
}

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// The gallery root could not be listed.
    RootNotReadable { path: String, detail: String },
    /// The root contains no subdirectories at all.
    NoClasses { path: String },
    /// Every class fell below the minimum usable image count.
    NoUsableClasses { min_images_per_class: usize },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootNotReadable { path, detail } => {
                write!(f, "cannot read gallery root {}: {}", path, detail)
            }
            Self::NoClasses { path } => {
                write!(f, "gallery root {} has no class subdirectories", path)
            }
            Self::NoUsableClasses {
                min_images_per_class,
            } => write!(
                f,
                "no class has at least {} usable images",
                min_images_per_class
            ),
        }
    }
}

impl std::error::Error for DatasetError {}

// ── Loading ──────────────────────────────────────────────────────────────

/// Flatten a grayscale image to a row-major `[0, 1]` vector, resizing to
/// `image_size` first when the dimensions differ.
pub fn vector_from_image(gray: &GrayImage, image_size: [u32; 2]) -> DVector<f64> {
    let [width, height] = image_size;
    let resized;
    let pixels = if gray.width() == width && gray.height() == height {
        gray
    } else {
        resized = imageops::resize(gray, width, height, FilterType::Triangle);
        &resized
    };
    DVector::from_iterator(
        width as usize * height as usize,
        pixels.as_raw().iter().map(|&v| f64::from(v) / 255.0),
    )
}

/// Load a gallery from `root`, one subdirectory per identity.
///
/// Subdirectories and files are visited in name order, so sample order is
/// stable across runs. Files that do not decode as images are skipped with
/// a warning. Classes left with fewer than `config.min_images_per_class`
/// usable images are dropped.
pub fn load_directory(root: &Path, config: &DatasetConfig) -> Result<Dataset, DatasetError> {
    let entries = fs::read_dir(root).map_err(|e| DatasetError::RootNotReadable {
        path: root.display().to_string(),
        detail: e.to_string(),
    })?;

    let mut class_dirs: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                class_dirs.push((name.to_owned(), path.clone()));
            }
        }
    }
    if class_dirs.is_empty() {
        return Err(DatasetError::NoClasses {
            path: root.display().to_string(),
        });
    }
    class_dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut classes = Vec::new();
    let mut samples = Vec::new();
    for (name, dir) in class_dirs {
        let vectors = load_class_dir(&dir, config.image_size);
        if vectors.len() < config.min_images_per_class {
            tracing::info!(
                class = %name,
                n_images = vectors.len(),
                min_required = config.min_images_per_class,
                "dropping class below the minimum image count"
            );
            continue;
        }
        let class = classes.len();
        classes.push(name);
        samples.extend(vectors.into_iter().map(|vector| Sample { vector, class }));
    }

    if classes.is_empty() {
        return Err(DatasetError::NoUsableClasses {
            min_images_per_class: config.min_images_per_class,
        });
    }

    let dim = config.dim();
    tracing::info!(
        n_classes = classes.len(),
        n_samples = samples.len(),
        dim,
        "gallery loaded"
    );
    Ok(Dataset {
        classes,
        dim,
        samples,
    })
}

fn load_class_dir(dir: &Path, image_size: [u32; 2]) -> Vec<DVector<f64>> {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "skipping unreadable class directory"
            );
            return Vec::new();
        }
    };
    files.sort();

    let mut vectors = Vec::with_capacity(files.len());
    for file in files {
        match image::open(&file) {
            Ok(img) => vectors.push(vector_from_image(&img.to_luma8(), image_size)),
            Err(e) => {
                tracing::warn!(
                    file = %file.display(),
                    error = %e,
                    "skipping unreadable image"
                );
            }
        }
    }
    vectors
}

// ── Tests ────────────────────────────────────────────────────────────────
