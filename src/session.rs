// ============================================================================
// MAP SESSION – preview / reset / ok / cancel flow of an adjustment tool
// ============================================================================

use crate::error::ImageMapError;
use crate::idle::IdleLoop;
use crate::image::DrawableRef;
use crate::image_map::ImageMap;
use crate::{log_info, log_warn};

/// Re-applies the tool's current settings, typically `map.apply(...)`.
pub type Mapper = Box<dyn FnMut(&mut ImageMap)>;

/// Drives one interactive image map for a tool dialog. Once the map has been
/// committed, cancelled or disposed, further calls do nothing.
pub struct MapSession {
    map: Option<ImageMap>,
    preview: bool,
    mapper: Mapper,
    reset_hook: Option<Box<dyn FnMut()>>,
}

impl std::fmt::Debug for MapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSession")
            .field("map", &self.map)
            .field("preview", &self.preview)
            .finish()
    }
}

impl MapSession {
    /// Start a session on `drawable` with previewing on.
    pub fn new(
        drawable: DrawableRef,
        idle: &IdleLoop,
        mapper: impl FnMut(&mut ImageMap) + 'static,
    ) -> Result<Self, ImageMapError> {
        let map = ImageMap::new(drawable, true, idle)?;
        Ok(Self {
            map: Some(map),
            preview: true,
            mapper: Box::new(mapper),
            reset_hook: None,
        })
    }

    /// Called by `reset` to put the tool's settings back to their defaults.
    pub fn on_reset(&mut self, hook: impl FnMut() + 'static) {
        self.reset_hook = Some(Box::new(hook));
    }

    pub fn map(&self) -> Option<&ImageMap> {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> Option<&mut ImageMap> {
        self.map.as_mut()
    }

    pub fn is_active(&self) -> bool {
        self.map.is_some()
    }

    pub fn preview_enabled(&self) -> bool {
        self.preview
    }

    /// Re-run the mapper if previewing is on.
    pub fn preview(&mut self) {
        if self.preview {
            self.run_mapper();
        }
    }

    /// Toggle previewing. Turning it off reverts the drawable; a depth
    /// mismatch during that revert ends the session.
    pub fn set_preview(&mut self, on: bool) -> Result<(), ImageMapError> {
        self.preview = on;
        if on {
            self.run_mapper();
            return Ok(());
        }
        let Some(map) = self.map.take() else { return Ok(()) };
        match map.clear() {
            Ok(map) => {
                self.map = Some(map);
                Ok(())
            }
            Err(err) => {
                log_warn!("preview session ended: {}", err);
                Err(err)
            }
        }
    }

    /// Restore default settings through the reset hook, then preview.
    pub fn reset(&mut self) {
        if let Some(hook) = self.reset_hook.as_mut() {
            hook();
        }
        self.preview();
    }

    /// Apply for real (mapping first when previewing was off) and commit.
    pub fn ok(&mut self) {
        if !self.preview {
            self.run_mapper();
        }
        if let Some(map) = self.map.take() {
            map.commit();
            log_info!("map session committed");
        }
    }

    /// Revert everything and end the session.
    pub fn cancel(&mut self) {
        let Some(map) = self.map.take() else { return };
        let drawable = map.drawable();
        map.abort();
        if let Some(image) = drawable.owner() {
            image.borrow_mut().flush();
        }
    }

    fn run_mapper(&mut self) {
        if let Some(map) = self.map.as_mut() {
            (self.mapper)(map);
        }
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        // An abandoned dialog behaves like cancel.
        self.cancel();
    }
}
