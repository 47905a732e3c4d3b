//! PaintCore: tiled pixel storage, the incremental image-map preview/apply
//! engine and the generated-brush mask renderer of a raster editor.

pub mod brush;
pub mod cli;
pub mod error;
pub mod idle;
pub mod image;
pub mod image_map;
pub mod logger;
pub mod ops;
pub mod region;
pub mod session;
pub mod settings;
pub mod tiles;
pub mod undo;
pub mod vbr;

pub use brush::{BrushMask, BrushShape, GeneratedBrush};
pub use error::{BrushFileError, CliError, ImageMapError};
pub use idle::{IdleHandle, IdleLoop};
pub use crate::image::{DrawableId, DrawableRef, Image, ImageEvent, ImageType, SampledColor, SharedImage};
pub use image_map::ImageMap;
pub use region::{PixelChunk, PixelChunkMut, PixelRegion, PixelRegionIterator, Rect};
pub use session::MapSession;
pub use settings::Settings;
pub use tiles::TileManager;
