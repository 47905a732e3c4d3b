// ============================================================================
// PaintCore CLI – headless adjustments and brush rendering
// ============================================================================
//
// Usage examples:
//   paintcore adjust -i photo.png --op invert -o inverted.png
//   paintcore adjust -i shots/*.jpg --op levels --amount 10 240 1.2 --output-dir out/
//   paintcore adjust -i a.png --op brightness-contrast --amount 20 10 --select 0,0,64,64
//   paintcore brush --radius 25 --hardness 0.3 --angle 30 --aspect 2 -o tip.png
//   paintcore brush --vbr soft.vbr --save-vbr copy.vbr -o soft.png
//
// Each input is loaded into an RGBA drawable, run through an image map on a
// private idle loop until the pass completes, committed, and saved.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use crate::brush::GeneratedBrush;
use crate::error::CliError;
use crate::idle::IdleLoop;
use crate::image::{Image, ImageType};
use crate::image_map::ImageMap;
use crate::ops::adjustments;
use crate::region::Rect;
use crate::settings::Settings;
use crate::tiles::{MAX_PIXELS, TileManager};
use crate::{log_err, log_info, logger, vbr};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PaintCore headless image processor.
#[derive(Parser, Debug)]
#[command(
    name = "paintcore",
    about = "Apply image-map adjustments and render generated brushes without a GUI"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Mirror the session log to stderr and print per-file timing.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file to use instead of the platform default.
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an adjustment over one or more images.
    Adjust(AdjustArgs),
    /// Render a generated brush mask to a grayscale PNG.
    Brush(BrushArgs),
}

#[derive(Args, Debug)]
pub struct AdjustArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// invert, brightness-contrast, levels, curves, threshold, posterize,
    /// desaturate or fill.
    #[arg(long)]
    pub op: String,

    /// Numeric parameters of the operation, in order.
    #[arg(long, num_args = 1.., allow_negative_numbers = true)]
    pub amount: Vec<f32>,

    /// Restrict the operation to a rectangle, `x,y,w,h`.
    #[arg(long, value_name = "X,Y,W,H")]
    pub select: Option<String>,

    /// Chunks per idle tick (overrides the settings file).
    #[arg(long)]
    pub chunks_per_tick: Option<usize>,
}

#[derive(Args, Debug)]
pub struct BrushArgs {
    /// Start from a GIMP-VBR brush file.
    #[arg(long, value_name = "FILE.vbr")]
    pub vbr: Option<PathBuf>,

    #[arg(long)]
    pub radius: Option<f64>,

    #[arg(long)]
    pub hardness: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    pub angle: Option<f64>,

    #[arg(long)]
    pub aspect: Option<f64>,

    /// Also write the resulting parameters as a GIMP-VBR file.
    #[arg(long, value_name = "FILE.vbr")]
    pub save_vbr: Option<PathBuf>,

    /// Mask image to write.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdjustOp {
    Invert,
    BrightnessContrast,
    Levels,
    Curves,
    Threshold,
    Posterize,
    Desaturate,
    Fill,
}

impl AdjustOp {
    pub fn from_name(name: &str) -> Result<Self, CliError> {
        Ok(match name.to_lowercase().replace('_', "-").as_str() {
            "invert" => AdjustOp::Invert,
            "brightness-contrast" | "bc" => AdjustOp::BrightnessContrast,
            "levels" => AdjustOp::Levels,
            "curves" => AdjustOp::Curves,
            "threshold" => AdjustOp::Threshold,
            "posterize" => AdjustOp::Posterize,
            "desaturate" => AdjustOp::Desaturate,
            "fill" => AdjustOp::Fill,
            _ => return Err(CliError::UnknownOp(name.to_string())),
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            AdjustOp::Invert => "Invert",
            AdjustOp::BrightnessContrast => "Brightness-Contrast",
            AdjustOp::Levels => "Levels",
            AdjustOp::Curves => "Curves",
            AdjustOp::Threshold => "Threshold",
            AdjustOp::Posterize => "Posterize",
            AdjustOp::Desaturate => "Desaturate",
            AdjustOp::Fill => "Fill",
        }
    }

    /// Start a pass of this operation on `map`. Missing amounts take the
    /// operation's neutral defaults.
    pub fn apply(self, map: &mut ImageMap, amount: &[f32]) {
        let arg = |i: usize, default: f32| amount.get(i).copied().unwrap_or(default);
        let byte = |v: f32| v.round().clamp(0.0, 255.0) as u8;
        match self {
            AdjustOp::Invert => map.apply(adjustments::invert()),
            AdjustOp::BrightnessContrast => {
                map.apply(adjustments::brightness_contrast(arg(0, 0.0), arg(1, 0.0)))
            }
            AdjustOp::Levels => map.apply(adjustments::levels(
                arg(0, 0.0),
                arg(1, 255.0),
                arg(2, 1.0),
                arg(3, 0.0),
                arg(4, 255.0),
            )),
            AdjustOp::Curves => {
                let points: Vec<(u8, u8)> = amount.chunks_exact(2).map(|p| (byte(p[0]), byte(p[1]))).collect();
                map.apply(adjustments::curves(&points))
            }
            AdjustOp::Threshold => map.apply(adjustments::threshold(byte(arg(0, 127.0)), byte(arg(1, 255.0)))),
            AdjustOp::Posterize => map.apply(adjustments::posterize(arg(0, 4.0).max(2.0) as u32)),
            AdjustOp::Desaturate => map.apply(adjustments::desaturate()),
            AdjustOp::Fill => {
                let pixel = vec![byte(arg(0, 0.0)), byte(arg(1, 0.0)), byte(arg(2, 0.0)), byte(arg(3, 255.0))];
                map.apply(adjustments::fill(pixel))
            }
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the parsed command and return an OS exit code.
/// `0` = everything succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    logger::set_echo(args.verbose);
    let settings = match &args.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    if let Err(e) = logger::init(settings.log_file.as_deref()) {
        eprintln!("warning: could not open log file: {}", e);
    }

    match &args.command {
        Command::Adjust(adjust) => run_adjust(adjust, &settings, args.verbose),
        Command::Brush(brush) => match run_brush(brush, &settings) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {}", e);
                log_err!("brush: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn run_adjust(args: &AdjustArgs, settings: &Settings, verbose: bool) -> ExitCode {
    let op = match AdjustOp::from_name(&args.op) {
        Ok(op) => op,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let select = match args.select.as_deref().map(parse_selection).transpose() {
        Ok(sel) => sel,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let inputs = match resolve_inputs(&args.input) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(source) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: {}", CliError::OutputDir { path: dir.clone(), source });
        return ExitCode::FAILURE;
    }

    let job = Job {
        op,
        amount: &args.amount,
        select,
        chunks_per_tick: args.chunks_per_tick.unwrap_or(settings.chunks_per_tick),
        max_undo_steps: settings.max_undo_steps,
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &job) {
            Ok(()) => {
                if verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("{}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Parameters shared by every file of one `adjust` run.
pub struct Job<'a> {
    pub op: AdjustOp,
    pub amount: &'a [f32],
    pub select: Option<Rect>,
    pub chunks_per_tick: usize,
    pub max_undo_steps: usize,
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

/// Load, adjust through an image map, commit and save one file.
pub fn run_one(input: &Path, output: &Path, job: &Job<'_>) -> Result<(), CliError> {
    // -- Step 1: Load ----------------------------------------------------
    // Header only, so oversize files are refused before decoding
    let (w, h) = ::image::image_dimensions(input)
        .map_err(|source| CliError::Load { path: input.to_path_buf(), source })?;
    check_dimensions(input, w, h)?;
    let rgba = ::image::open(input)
        .map_err(|source| CliError::Load { path: input.to_path_buf(), source })?
        .to_rgba8();
    let (w, h) = rgba.dimensions();

    let image = Image::new(w, h, ImageType::RgbA);
    let drawable = Image::add_drawable(&image, "Background", ImageType::RgbA, (0, 0));
    {
        let mut img = image.borrow_mut();
        img.undo_stack_mut().set_max_steps(job.max_undo_steps);
        if let Some(d) = img.drawable_mut(drawable.id()) {
            d.tiles_mut().write_rect(Rect::new(0, 0, w, h), rgba.as_raw());
        }
        if let Some(sel) = job.select {
            img.set_selection_rect(sel);
        }
    }

    // -- Step 2: Apply ---------------------------------------------------
    let idle = IdleLoop::new();
    let mut map = ImageMap::new(drawable.clone(), false, &idle)?;
    map.set_chunks_per_tick(job.chunks_per_tick);
    map.set_description(job.op.label());
    job.op.apply(&mut map, job.amount);
    let ticks = idle.run_until_idle(usize::MAX);
    map.commit();
    log_info!("{}: {} applied in {} idle ticks", input.display(), job.op.label(), ticks);

    // -- Step 3: Save ----------------------------------------------------
    let raw = image
        .borrow()
        .drawable(drawable.id())
        .map(|d| d.tiles().to_raw())
        .unwrap_or_default();
    let out: ::image::RgbaImage = export_buffer(output, w, h, raw)?;
    out.save(output)
        .map_err(|source| CliError::Save { path: output.to_path_buf(), source })?;
    Ok(())
}

/// Build the brush described by `args`, optionally save it as VBR, and write
/// its mask as a grayscale image.
pub fn run_brush(args: &BrushArgs, settings: &Settings) -> Result<(), CliError> {
    let mut brush = match &args.vbr {
        Some(path) => vbr::load(path)?,
        None => {
            let mut b = GeneratedBrush::default();
            b.set_spacing(settings.brush_spacing);
            b
        }
    };

    brush.freeze();
    if let Some(r) = args.radius {
        brush.set_radius(r);
    }
    if let Some(h) = args.hardness {
        brush.set_hardness(h);
    }
    if let Some(a) = args.angle {
        brush.set_angle(a);
    }
    if let Some(a) = args.aspect {
        brush.set_aspect_ratio(a);
    }
    brush.thaw();

    if let Some(path) = &args.save_vbr {
        vbr::save(&mut brush, path)?;
    }

    let mask = brush.mask();
    let img: ::image::GrayImage = export_buffer(&args.output, mask.width(), mask.height(), mask.data().to_vec())?;
    img.save(&args.output)
        .map_err(|source| CliError::Save { path: args.output.clone(), source })?;
    log_info!(
        "brush mask {}×{} written to {}",
        mask.width(),
        mask.height(),
        args.output.display()
    );
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Refuse images the tile store cannot hold instead of letting it shrink them.
pub fn check_dimensions(path: &Path, width: u32, height: u32) -> Result<(), CliError> {
    if TileManager::fits(width, height) {
        return Ok(());
    }
    Err(CliError::TooLarge { path: path.to_path_buf(), width, height, max: MAX_PIXELS })
}

/// Wrap packed pixels for saving. A length that does not match the
/// dimensions is an error, never a blank image.
pub fn export_buffer<P>(
    path: &Path,
    width: u32,
    height: u32,
    raw: Vec<u8>,
) -> Result<::image::ImageBuffer<P, Vec<u8>>, CliError>
where
    P: ::image::Pixel<Subpixel = u8>,
{
    ::image::ImageBuffer::from_raw(width, height, raw).ok_or_else(|| CliError::Export {
        path: path.to_path_buf(),
        width,
        height,
    })
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
pub fn resolve_inputs(patterns: &[String]) -> Result<Vec<PathBuf>, CliError> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        let entries = glob::glob(pattern).map_err(|source| CliError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        let mut matched = false;
        for entry in entries.flatten() {
            if !result.contains(&entry) {
                result.push(entry);
            }
            matched = true;
        }
        if !matched {
            eprintln!("warning: pattern '{}' matched no files.", pattern);
        }
    }

    if result.is_empty() {
        return Err(CliError::NoInputs);
    }
    Ok(result)
}

/// `x,y,w,h` → rectangle in image coordinates.
pub fn parse_selection(text: &str) -> Result<Rect, CliError> {
    let parts: Vec<u32> = text
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|_| CliError::BadSelection(text.to_string()))?;
    match parts.as_slice() {
        &[x, y, w, h] if w > 0 && h > 0 => Ok(Rect::new(x, y, w, h)),
        _ => Err(CliError::BadSelection(text.to_string())),
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, keeps the input file name)
/// 3. Fallback: next to the input as `<stem>_adjusted.<ext>`
pub fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let file_name = input.file_name()?;
    if let Some(dir) = output_dir {
        return Some(dir.join(file_name));
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_adjusted.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_needs_four_positive_numbers() {
        assert_eq!(parse_selection("1, 2,3,4").unwrap(), Rect::new(1, 2, 3, 4));
        assert!(parse_selection("1,2,3").is_err());
        assert!(parse_selection("1,2,0,4").is_err());
        assert!(parse_selection("a,b,c,d").is_err());
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/a.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(build_output_path(input, None, Some(Path::new("out"))), Some(PathBuf::from("out/a.jpg")));
        assert_eq!(build_output_path(input, None, None), Some(PathBuf::from("shots/a_adjusted.jpg")));
    }

    #[test]
    fn oversize_dimensions_are_rejected() {
        let path = Path::new("huge.png");
        assert!(check_dimensions(path, 4000, 3000).is_ok());
        let err = check_dimensions(path, 20_000, 20_000).unwrap_err();
        assert!(matches!(
            err,
            CliError::TooLarge { width: 20_000, height: 20_000, max: MAX_PIXELS, .. }
        ));
        assert!(err.to_string().contains("huge.png"));
    }

    #[test]
    fn short_pixel_buffer_is_an_export_error() {
        let path = Path::new("out.png");
        let err = export_buffer::<::image::Rgba<u8>>(path, 4, 4, vec![0; 4 * 4 * 4 - 1]).unwrap_err();
        assert!(matches!(err, CliError::Export { width: 4, height: 4, .. }));
        let err = export_buffer::<::image::Luma<u8>>(path, 3, 2, Vec::new()).unwrap_err();
        assert!(matches!(err, CliError::Export { width: 3, height: 2, .. }));

        let ok: ::image::GrayImage = export_buffer(path, 3, 2, vec![9; 6]).unwrap();
        assert_eq!(ok.get_pixel(2, 1).0, [9]);
    }

    #[test]
    fn op_names_are_forgiving() {
        assert_eq!(AdjustOp::from_name("Brightness_Contrast").unwrap(), AdjustOp::BrightnessContrast);
        assert!(matches!(AdjustOp::from_name("blur"), Err(CliError::UnknownOp(_))));
    }

    #[test]
    fn cli_parses_adjust_subcommand() {
        let args = CliArgs::parse_from([
            "paintcore", "adjust", "-i", "a.png", "--op", "levels", "--amount", "-5", "250", "-v",
        ]);
        assert!(args.verbose);
        let Command::Adjust(adjust) = args.command else { panic!("expected adjust") };
        assert_eq!(adjust.amount, vec![-5.0, 250.0]);
        assert_eq!(adjust.op, "levels");
    }
}
