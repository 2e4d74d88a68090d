//! camcal — batch chessboard camera calibration.
//!
//! Calibrates the pinhole, fisheye and omnidirectional models from a
//! directory of chessboard photographs, writes one OpenCV-compatible XML
//! result file per model and undistorts a sample photograph through each.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use camcal::pipeline::{run, PipelineConfig};
use camcal_core::{BoardSpec, Real};

#[derive(Parser)]
#[command(name = "camcal")]
#[command(about = "Chessboard camera calibration: pinhole, fisheye and omnidirectional models")]
#[command(version)]
struct Cli {
    /// Directory holding the calibration images.
    #[arg(long, default_value = "./img")]
    img_dir: PathBuf,

    /// File-name suffix selecting calibration images.
    #[arg(long, default_value = ".jpg")]
    ext: String,

    /// Sample photograph to undistort with each calibrated model.
    #[arg(long, default_value = "./photo.jpg")]
    photo: PathBuf,

    /// Directory receiving the XML results and undistorted images.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Inner corners per board row.
    #[arg(long, default_value = "7")]
    cols: u32,

    /// Inner corners per board column.
    #[arg(long, default_value = "10")]
    rows: u32,

    /// Distance between adjacent corners, in millimeters.
    #[arg(long, default_value = "24.0")]
    spacing: Real,

    /// Verbose logging (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    camcal_core::init_with_level(level).context("logger initialization")?;

    let config = PipelineConfig {
        img_dir: cli.img_dir,
        ext: cli.ext,
        photo: cli.photo,
        out_dir: cli.out_dir,
        board: BoardSpec::new(cli.cols, cli.rows, cli.spacing),
    };

    let summary = run(&config).context("calibration pipeline")?;
    println!("{summary}");
    Ok(())
}
