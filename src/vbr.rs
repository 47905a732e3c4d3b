//! `GIMP-VBR` generated-brush files.
//!
//! Plain text, one value per line:
//!
//! ```text
//! GIMP-VBR
//! 1.0
//! <name>
//! <spacing>
//! <radius>
//! <hardness>
//! <aspect ratio>
//! <angle>
//! ```
//!
//! The numeric fields are read as whitespace-separated tokens, so files that
//! put several values on one line still load.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::brush::GeneratedBrush;
use crate::error::BrushFileError;

pub const MAGIC: &str = "GIMP-VBR";
pub const VERSION: &str = "1.0";
/// Names longer than this many bytes are cut when saving.
pub const MAX_NAME_BYTES: usize = 255;

pub fn load(path: &Path) -> Result<GeneratedBrush, BrushFileError> {
    let text = fs::read_to_string(path).map_err(|source| BrushFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let brush = parse(&text)?;
    crate::log_info!("loaded brush '{}' from {}", brush.name(), path.display());
    Ok(brush)
}

/// Parse file contents. The parameters go through the clamping setters
/// inside one freeze/thaw, and the result is marked clean.
pub fn parse(text: &str) -> Result<GeneratedBrush, BrushFileError> {
    let mut lines = text.splitn(4, '\n');

    let magic = lines.next().unwrap_or_default();
    if !magic.starts_with(MAGIC) {
        return Err(BrushFileError::BadMagic(magic.trim_end().to_string()));
    }

    let version_line = lines.next().ok_or(BrushFileError::MissingField("version"))?.trim();
    let version: f64 = version_line.parse().map_err(|_| BrushFileError::BadNumber {
        field: "version",
        value: version_line.to_string(),
    })?;
    if version >= 2.0 {
        return Err(BrushFileError::UnsupportedVersion(version_line.to_string()));
    }

    let name = lines
        .next()
        .ok_or(BrushFileError::MissingField("name"))?
        .trim_end_matches('\r');

    let mut tokens = lines.next().unwrap_or_default().split_whitespace();
    let mut field = |field: &'static str| -> Result<f64, BrushFileError> {
        let token = tokens.next().ok_or(BrushFileError::MissingField(field))?;
        token.parse().map_err(|_| BrushFileError::BadNumber { field, value: token.to_string() })
    };
    let spacing = field("spacing")?;
    let radius = field("radius")?;
    let hardness = field("hardness")?;
    let aspect_ratio = field("aspect_ratio")?;
    let angle = field("angle")?;

    let mut brush = GeneratedBrush::default();
    brush.freeze();
    brush.set_name(name);
    brush.set_spacing(spacing);
    brush.set_radius(radius);
    brush.set_hardness(hardness);
    brush.set_aspect_ratio(aspect_ratio);
    brush.set_angle(angle);
    brush.thaw();
    brush.mark_clean();
    Ok(brush)
}

/// Serialise in the layout `parse` reads back.
pub fn write(brush: &GeneratedBrush, mut out: impl Write) -> std::io::Result<()> {
    writeln!(out, "{}", MAGIC)?;
    writeln!(out, "{}", VERSION)?;
    writeln!(out, "{}", truncate_name(brush.name()))?;
    writeln!(out, "{:.6}", brush.spacing())?;
    writeln!(out, "{:.6}", brush.radius())?;
    writeln!(out, "{:.6}", brush.hardness())?;
    writeln!(out, "{:.6}", brush.aspect_ratio())?;
    writeln!(out, "{:.6}", brush.angle())?;
    Ok(())
}

/// Write to `path` and mark the brush clean.
pub fn save(brush: &mut GeneratedBrush, path: &Path) -> Result<(), BrushFileError> {
    let io_err = |source| BrushFileError::Io { path: path.to_path_buf(), source };
    let mut buf = Vec::new();
    write(brush, &mut buf).map_err(io_err)?;
    fs::write(path, buf).map_err(io_err)?;
    brush.mark_clean();
    crate::log_info!("saved brush '{}' to {}", brush.name(), path.display());
    Ok(())
}

fn truncate_name(name: &str) -> &str {
    let name = name.lines().next().unwrap_or_default();
    if name.len() <= MAX_NAME_BYTES {
        return name;
    }
    let mut end = MAX_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_six_decimals() {
        let brush = GeneratedBrush::new(10.0, 0.25, 45.0, 2.0);
        let mut buf = Vec::new();
        write(&brush, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "GIMP-VBR\n1.0\nUntitled\n20.000000\n10.000000\n0.250000\n2.000000\n45.000000\n"
        );
    }

    #[test]
    fn long_names_are_cut_on_char_boundary() {
        let name = "é".repeat(200);
        let cut = truncate_name(&name);
        assert!(cut.len() <= MAX_NAME_BYTES);
        assert_eq!(cut.len(), 254);
    }

    #[test]
    fn numbers_may_share_a_line() {
        let brush = parse("GIMP-VBR\n1.0\nPacked\n25 7 0.5\n1.5 30\n").unwrap();
        assert_eq!(brush.spacing(), 25.0);
        assert_eq!(brush.radius(), 7.0);
        assert_eq!(brush.angle(), 30.0);
    }
}
