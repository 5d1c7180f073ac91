//! Command line front end for ORC camera projections.
//!
//! Usage:
//! ```bash
//! orc-camera --config samples/camera.yaml undistort --points samples/pixels.json
//! orc-camera --config samples/camera.yaml --format csv line --start 100,100 --end 1800,1000 --split 50
//! orc-camera --config samples/camera.yaml gcp-error --gcps samples/gcps.json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use nalgebra::{Point2, Point3};
use orc_camera::projection::{
    distort_points, normalize_points, project_line, project_points, undistort_points,
    UndistortOptions, DEFAULT_UNDISTORT_ITERATIONS,
};
use orc_camera::util::{self, GroundControlPoint};
use orc_camera::CameraConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Pinhole projection and lens distortion for ORC-OS camera configurations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Camera configuration file (YAML or JSON)
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Output format for point lists
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert pixel points to normalized camera coordinates (or back with --reverse)
    Normalize {
        /// JSON file with an array of [x, y] points
        #[arg(short = 'p', long)]
        points: PathBuf,

        #[arg(long)]
        reverse: bool,
    },
    /// Remove lens distortion from pixel points
    Undistort {
        /// JSON file with an array of [x, y] points
        #[arg(short = 'p', long)]
        points: PathBuf,

        #[arg(long, default_value_t = DEFAULT_UNDISTORT_ITERATIONS)]
        iterations: usize,

        /// Stop iterating once the update falls below this (normalized units)
        #[arg(long)]
        tolerance: Option<f64>,
    },
    /// Apply lens distortion to pixel points
    Distort {
        /// JSON file with an array of [x, y] points
        #[arg(short = 'p', long)]
        points: PathBuf,
    },
    /// Project 3D points with the configured pose
    Project {
        /// JSON file with an array of [x, y, z] points
        #[arg(short = 'p', long)]
        points: PathBuf,
    },
    /// Sample the distorted image of a straight line between two pixels
    Line {
        /// Start pixel as x,y
        #[arg(long, value_parser = parse_pixel, allow_hyphen_values = true)]
        start: Point2<f64>,

        /// End pixel as x,y
        #[arg(long, value_parser = parse_pixel, allow_hyphen_values = true)]
        end: Point2<f64>,

        /// Number of samples along the line
        #[arg(short = 's', long, default_value_t = 100)]
        split: usize,

        #[arg(long, default_value_t = DEFAULT_UNDISTORT_ITERATIONS)]
        iterations: usize,
    },
    /// Reprojection error of the configured camera over ground control points
    ///
    /// JSON output carries the pose, the statistics and the per-point residuals;
    /// CSV output lists one residual row per point.
    GcpError {
        /// JSON file with an array of {"image": [x, y], "world": [x, y, z]} records
        #[arg(short = 'g', long)]
        gcps: PathBuf,
    },
}

fn parse_pixel(value: &str) -> Result<Point2<f64>, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("Expected x,y but got '{value}'"))?;
    let x = x
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("Invalid x coordinate '{x}': {e}"))?;
    let y = y
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("Invalid y coordinate '{y}': {e}"))?;
    Ok(Point2::new(x, y))
}

fn read_points_2d(path: &Path) -> Result<Vec<Point2<f64>>, Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(path)?;
    let pairs: Vec<[f64; 2]> = serde_json::from_str(&contents)?;
    Ok(pairs.iter().map(|p| Point2::new(p[0], p[1])).collect())
}

fn read_points_3d(path: &Path) -> Result<Vec<Point3<f64>>, Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(path)?;
    let triples: Vec<[f64; 3]> = serde_json::from_str(&contents)?;
    Ok(triples
        .iter()
        .map(|p| Point3::new(p[0], p[1], p[2]))
        .collect())
}

fn emit(points: &[Point2<f64>], format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", util::points_to_json(points)?),
        OutputFormat::Csv => util::write_points_csv(io::stdout().lock(), points)?,
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let config = CameraConfig::load(&cli.config)?;
    let camera = &config.camera_matrix;
    let dist = config.distortion();
    info!("Camera {:?}, distortion {:?}", camera, dist);

    match cli.command {
        Command::Normalize { points, reverse } => {
            let points = read_points_2d(&points)?;
            emit(&normalize_points(&points, camera, reverse), cli.format)?;
        }
        Command::Undistort {
            points,
            iterations,
            tolerance,
        } => {
            let points = read_points_2d(&points)?;
            let options = UndistortOptions {
                iterations,
                tolerance,
            };
            emit(&undistort_points(&points, camera, dist, &options)?, cli.format)?;
        }
        Command::Distort { points } => {
            let points = read_points_2d(&points)?;
            emit(&distort_points(&points, camera, dist)?, cli.format)?;
        }
        Command::Project { points } => {
            let points = read_points_3d(&points)?;
            emit(
                &project_points(&points, &config.pose(), camera, dist)?,
                cli.format,
            )?;
        }
        Command::Line {
            start,
            end,
            split,
            iterations,
        } => {
            let options = UndistortOptions::with_iterations(iterations);
            let line = project_line(&start, &end, camera, dist, split, &options)?;
            emit(&line, cli.format)?;
        }
        Command::GcpError { gcps } => {
            let contents = fs::read_to_string(&gcps)?;
            let gcps: Vec<GroundControlPoint> = serde_json::from_str(&contents)?;
            info!("Evaluating {} ground control points", gcps.len());

            let pose = config.pose();
            let (residuals, stats) = util::reprojection_report(&gcps, &pose, camera, dist)?;
            info!("Reprojection {:?}", stats);
            match cli.format {
                OutputFormat::Json => {
                    let report = serde_json::json!({
                        "pose": pose,
                        "error": stats,
                        "residuals": residuals,
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Csv => {
                    util::write_residuals_csv(io::stdout().lock(), &gcps, &residuals)?
                }
            }
        }
    }

    Ok(())
}
