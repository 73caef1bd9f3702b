use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use corofem::io::{load_config, load_tetgen, save_surface_obj, SceneConfig};
use corofem::{Material, SimParams, SolverBuilder};

const ABOUT: &str = "
Corofem is a tetrahedral soft body simulator based on corotated linear finite elements.";

#[derive(Parser)]
#[clap(author, about = ABOUT, name = "corofem")]
struct Opt {
    /// Path to the TetGen `.node` file of the simulated mesh.
    ///
    /// The `.ele` file with the same stem is expected in the same directory.
    #[clap(name = "MESH", parse(from_os_str))]
    mesh: PathBuf,

    /// Output surface file(s) in Wavefront `.obj` format.
    ///
    /// One file is written per frame by incrementing the last numeric value in the file name.
    /// For instance, an output value `./out_0001.obj` will be followed by `./out_0002.obj`,
    /// `./out_0003.obj` and so on. If no number occurs in the file name, the frame number is
    /// appended to the file stem.
    #[clap(name = "OUTPUT", parse(from_os_str))]
    output: PathBuf,

    /// Scene configuration file in `.ron` or `.json` format.
    ///
    /// If omitted, the reference explicit scene is used.
    #[clap(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Use the reference implicit scene when no configuration file is given.
    #[clap(long)]
    implicit: bool,

    /// Log file path.
    #[clap(short, long, parse(from_os_str))]
    logfile: Option<PathBuf>,

    /// Number of frames to simulate.
    #[clap(short, long, default_value = "1")]
    frames: u64,

    /// Number of substeps per frame.
    #[clap(short, long, default_value = "1")]
    substeps: u32,
}

/// Output path pattern split into the parts surrounding the frame number.
struct FramePaths {
    dir: PathBuf,
    stem: String,
    ext: String,
    num_digits: usize,
    first_frame: u64,
}

impl FramePaths {
    fn new(output: &Path) -> Result<Self> {
        let mut stem = if let Some(stem) = output.file_stem() {
            stem.to_string_lossy().to_string()
        } else {
            anyhow::bail!("Missing output file name in output path: {}", output.display())
        };
        let ext = match output.extension().and_then(|x| x.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("obj") => ext.to_string(),
            Some(ext) => anyhow::bail!("Unsupported output file extension: '.{}'", ext),
            None => anyhow::bail!("Missing file extension in output path: {}", output.display()),
        };

        // Determine the digits of the last numeric value.
        let num_digits = stem.chars().rev().take_while(char::is_ascii_digit).count();
        let mut first_frame = 0;
        if num_digits > 0 {
            first_frame = stem[stem.len() - num_digits..].parse()?;
            stem.truncate(stem.len() - num_digits);
        }

        let dir = output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(FramePaths {
            dir,
            stem,
            ext,
            num_digits,
            first_frame,
        })
    }

    fn frame(&self, frame: u64) -> PathBuf {
        let mut file_name = self.stem.clone();
        file_name.push_str(&format!("{:01$}", self.first_frame + frame, self.num_digits));
        self.dir.join(file_name).with_extension(&self.ext)
    }
}

fn append_to_log(logfile: &Path, args: std::fmt::Arguments) -> std::io::Result<()> {
    let mut f = std::fs::File::options().append(true).open(logfile)?;
    f.write_fmt(args)
}

pub fn main() {
    if let Err(err) = try_main() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

pub fn try_main() -> Result<()> {
    let _ = env_logger::Builder::from_env("COROFEM_LOG").try_init();

    let opt = Opt::parse();
    let frame_paths = FramePaths::new(&opt.output)?;

    // Pre-emptively create the log file. This way we can fail early.
    if let Some(logfile) = opt.logfile.as_ref() {
        let _ = std::fs::File::create(logfile)?;
    }

    let config = match opt.config.as_ref() {
        Some(path) => load_config(path)?,
        None if opt.implicit => SceneConfig {
            sim_params: SimParams::implicit(),
            material: Material::implicit(),
        },
        None => SceneConfig {
            sim_params: SimParams::explicit(),
            material: Material::explicit(),
        },
    };

    // Write scene config so we know how the following log was created.
    if let Some(logfile) = opt.logfile.as_ref() {
        append_to_log(logfile, format_args!("\nConfig:\n{:#?}\n", config))?;
    }

    let mesh = load_tetgen(&opt.mesh)?;
    let mut solver = SolverBuilder::new(config.sim_params)
        .set_solid(mesh, config.material)
        .build()?;

    save_surface_obj(solver.mesh(), frame_paths.frame(0))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))?;

    let progress = ProgressBar::new(opt.frames);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} frames [{elapsed_precise}] {msg}")?,
    );

    let mut write_error = None;
    let completed = solver.run(opt.frames, opt.substeps, |frame, result, solver| {
        if let Some(logfile) = opt.logfile.as_ref() {
            if let Err(err) = append_to_log(logfile, format_args!("\nFrame {}:\n{}", frame, result))
            {
                log::error!("Failed to write to log file: {}", err);
            }
        }
        if let Err(err) = save_surface_obj(solver.mesh(), frame_paths.frame(frame + 1)) {
            write_error = Some(err);
            return false;
        }
        progress.set_message(format!("KE = {:.3e}", solver.kinetic_energy()));
        progress.inc(1);
        !interrupted.load(Ordering::SeqCst)
    })?;

    if let Some(err) = write_error {
        progress.abandon();
        return Err(err.into());
    }

    if completed < opt.frames {
        progress.abandon_with_message("interrupted");
    } else {
        progress.finish();
    }
    log::info!("Simulated {} frames", completed);
    Ok(())
}
