use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the image-map engine. Everything else it encounters
/// (a drawable that vanished mid-session, an empty selection) is a quiet no-op.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageMapError {
    #[error("drawable no longer belongs to a live image")]
    ImageGone,
    #[error("image depth change, unable to restore original image (snapshot {snapshot} bpp, drawable {drawable} bpp)")]
    DepthMismatch { snapshot: usize, drawable: usize },
}

#[derive(Debug, Error)]
pub enum BrushFileError {
    #[error("could not access brush file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a GIMP-VBR brush (magic was {0:?})")]
    BadMagic(String),
    #[error("unsupported brush version {0}")]
    UnsupportedVersion(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a number: {value:?}")]
    BadNumber { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("no input files matched")]
    NoInputs,
    #[error("failed to load '{}': {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
    #[error("failed to save '{}': {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
    #[error("'{}' is {width}×{height}, larger than the {max} pixel limit", .path.display())]
    TooLarge { path: PathBuf, width: u32, height: u32, max: u64 },
    #[error("could not export {width}×{height} pixels to '{}'", .path.display())]
    Export { path: PathBuf, width: u32, height: u32 },
    #[error("could not create output directory '{}': {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown operation '{0}'")]
    UnknownOp(String),
    #[error("bad selection '{0}', expected x,y,w,h")]
    BadSelection(String),
    #[error(transparent)]
    Map(#[from] ImageMapError),
    #[error(transparent)]
    Brush(#[from] BrushFileError),
}
