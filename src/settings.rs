use std::path::{Path, PathBuf};

/// Persistent engine settings, stored as `key=value` lines.
///
/// Unknown keys are ignored and unparsable values keep their default, so an
/// older or hand-edited file never prevents start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Undo steps kept per image.
    pub max_undo_steps: usize,
    /// Chunks an image map processes per idle tick.
    pub chunks_per_tick: usize,
    /// Default spacing (percent) for new generated brushes.
    pub brush_spacing: f64,
    /// Session log location; `None` means the platform data directory.
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_undo_steps: 50,
            chunks_per_tick: 1,
            brush_spacing: crate::brush::DEFAULT_SPACING,
            log_file: None,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/paintcore/paintcore_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PaintCore\paintcore_settings.cfg
    /// On macOS:   ~/Library/Application Support/PaintCore/paintcore_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("PaintCore").join("paintcore_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PaintCore")
                    .join("paintcore_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("paintcore").join("paintcore_settings.cfg"))
        }
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::settings_path().map_or_else(Self::default, |p| Self::load_from(&p))
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "max_undo_steps" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.max_undo_steps = v.max(1);
                    }
                }
                "chunks_per_tick" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.chunks_per_tick = v.max(1);
                    }
                }
                "brush_spacing" => {
                    if let Ok(v) = val.parse::<f64>() {
                        s.brush_spacing = crate::brush::clamp_spacing(v);
                    }
                }
                "log_file" => {
                    s.log_file = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_undo_steps={}\nchunks_per_tick={}\nbrush_spacing={}\nlog_file={}\n",
            self.max_undo_steps,
            self.chunks_per_tick,
            self.brush_spacing,
            self.log_file.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
        )
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Save to the default location. Failures are logged, not returned.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_warn!("could not save settings to {}: {}", path.display(), e);
        }
    }
}
