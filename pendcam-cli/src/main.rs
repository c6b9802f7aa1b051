//! pendcam CLI: pendulum simulation and synthetic camera views

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pendcam_core::{
    CalibratorConfig, CameraCalibrator, Display, IntegratorOptions, NoiseConfig, PendulumParameters,
    PendulumSimulator, PendulumState, PlanarObservation, generate_checkerboard, mse,
    reprojection_error, synthesize,
};
use pendcam_io::CorrespondenceSet;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pendcam")]
#[command(about = "Simulate a spherical pendulum and the camera that films it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate the pendulum and write time, state, position and energy as CSV.
    Simulate {
        #[command(flatten)]
        pendulum: PendulumArgs,

        /// Initial polar angle (degrees).
        #[arg(long, default_value_t = 10.0)]
        theta_deg: f64,

        /// Initial azimuthal angle (degrees).
        #[arg(long, default_value_t = 0.0)]
        phi_deg: f64,

        /// Initial polar rate (degrees per second).
        #[arg(long, default_value_t = 60.0)]
        dtheta_deg: f64,

        /// Initial azimuthal rate (degrees per second).
        #[arg(long, default_value_t = 150.0)]
        dphi_deg: f64,

        /// End of the simulated interval (s).
        #[arg(long, default_value_t = 5.0)]
        t_max: f64,

        /// Number of output samples, both interval ends included.
        #[arg(long, default_value_t = 500)]
        samples: usize,

        /// Relative integration tolerance.
        #[arg(long, default_value_t = 1e-6)]
        rtol: f64,

        /// Absolute integration tolerance.
        #[arg(long, default_value_t = 1e-9)]
        atol: f64,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Render a display-scaled checkerboard to an image file.
    Checkerboard {
        #[command(flatten)]
        display: DisplayArgs,

        #[command(flatten)]
        board: BoardArgs,

        /// Output image path (format from extension).
        #[arg(long)]
        out: PathBuf,
    },

    /// Calibrate from a correspondence JSON file and save the calibration.
    Calibrate {
        /// Correspondence set (JSON).
        #[arg(long)]
        correspondences: PathBuf,

        /// Assume a distortion-free lens.
        #[arg(long)]
        no_distortion: bool,

        /// Cap on alternating intrinsics / distortion rounds.
        #[arg(long, default_value_t = 500)]
        max_distortion_rounds: usize,

        /// Output calibration path (JSON).
        #[arg(long)]
        out: PathBuf,
    },

    /// Project board corners through every pose of a calibration and save them
    /// as a correspondence set.
    Corners {
        /// Calibration file (JSON) supplying the camera and its poses.
        #[arg(long)]
        calibration: PathBuf,

        /// Inner corners per board row.
        #[arg(long, default_value_t = 8)]
        corner_cols: usize,

        /// Inner corners per board column.
        #[arg(long, default_value_t = 5)]
        corner_rows: usize,

        /// Board square size (mm).
        #[arg(long, default_value_t = 20.0)]
        square_mm: f64,

        /// Image width (px).
        #[arg(long, default_value_t = 640)]
        width: u32,

        /// Image height (px).
        #[arg(long, default_value_t = 480)]
        height: u32,

        /// Output correspondence path (JSON).
        #[arg(long)]
        out: PathBuf,
    },

    /// Synthesize the camera view of a checkerboard shown on a display.
    Render {
        /// Calibration file (JSON) with at least one stored pose.
        #[arg(long)]
        calibration: PathBuf,

        /// Which stored pose to render from.
        #[arg(long, default_value_t = 0)]
        pose_index: usize,

        /// Pattern image shown on the display; a checkerboard is generated when omitted.
        #[arg(long)]
        pattern: Option<PathBuf>,

        #[command(flatten)]
        display: DisplayArgs,

        #[command(flatten)]
        board: BoardArgs,

        /// Output width (px).
        #[arg(long, default_value_t = 640)]
        width: u32,

        /// Output height (px).
        #[arg(long, default_value_t = 480)]
        height: u32,

        #[command(flatten)]
        noise: NoiseArgs,

        /// Output image path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Pixel mean squared error between two images.
    Compare {
        #[arg(long)]
        a: PathBuf,

        #[arg(long)]
        b: PathBuf,
    },
}

#[derive(Args)]
struct PendulumArgs {
    /// String length (m).
    #[arg(long, default_value_t = 0.127)]
    l_string: f64,

    /// Bob radius (m).
    #[arg(long, default_value_t = 0.013)]
    r_sphere: f64,

    /// Gravitational acceleration (m/s^2).
    #[arg(long, default_value_t = 9.81)]
    g: f64,

    /// Polar damping coefficient.
    #[arg(long, default_value_t = 3e-3)]
    delta_theta: f64,

    /// Azimuthal damping coefficient.
    #[arg(long, default_value_t = 3e-3)]
    delta_phi: f64,
}

#[derive(Args)]
struct DisplayArgs {
    /// Physical display width (m).
    #[arg(long, default_value_t = 0.344)]
    display_width_m: f64,

    /// Physical display height (m).
    #[arg(long, default_value_t = 0.193)]
    display_height_m: f64,

    /// Horizontal display resolution (px).
    #[arg(long, default_value_t = 1920)]
    display_width_px: u32,

    /// Vertical display resolution (px).
    #[arg(long, default_value_t = 1080)]
    display_height_px: u32,
}

impl DisplayArgs {
    fn display(&self) -> Result<Display> {
        Display::new(
            self.display_width_m,
            self.display_height_m,
            self.display_width_px,
            self.display_height_px,
        )
        .context("invalid display description")
    }
}

#[derive(Args)]
struct BoardArgs {
    /// Squares per row.
    #[arg(long, default_value_t = 9)]
    cols: usize,

    /// Squares per column.
    #[arg(long, default_value_t = 6)]
    rows: usize,

    /// Square size (mm); largest fitting square when omitted.
    #[arg(long)]
    square_mm: Option<f64>,

    /// Swap black and white squares.
    #[arg(long)]
    invert: bool,
}

#[derive(Args)]
struct NoiseArgs {
    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 0.0)]
    gaussian_std: f64,

    /// Photon budget for Poisson shot noise (0 disables).
    #[arg(long, default_value_t = 0.0)]
    poisson_lambda: f64,

    /// Apply a 1x3 horizontal motion blur.
    #[arg(long)]
    motion_blur: bool,

    /// Noise RNG seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl NoiseArgs {
    fn config(&self) -> Option<NoiseConfig> {
        let config = NoiseConfig {
            gaussian_std: self.gaussian_std,
            poisson_lambda: self.poisson_lambda,
            motion_blur: self.motion_blur,
            seed: self.seed,
        };
        (!config.is_noop()).then_some(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            pendulum,
            theta_deg,
            phi_deg,
            dtheta_deg,
            dphi_deg,
            t_max,
            samples,
            rtol,
            atol,
            out,
        } => {
            let initial = PendulumState::from_degrees(theta_deg, phi_deg, dtheta_deg, dphi_deg);
            let options = IntegratorOptions {
                rtol,
                atol,
                ..IntegratorOptions::default()
            };
            run_simulate(&pendulum, initial, t_max, samples, options, &out)
        }
        Commands::Checkerboard { display, board, out } => run_checkerboard(&display, &board, &out),
        Commands::Calibrate {
            correspondences,
            no_distortion,
            max_distortion_rounds,
            out,
        } => {
            let config = CalibratorConfig {
                estimate_distortion: !no_distortion,
                max_distortion_rounds,
                ..CalibratorConfig::default()
            };
            run_calibrate(&correspondences, config, &out)
        }
        Commands::Render {
            calibration,
            pose_index,
            pattern,
            display,
            board,
            width,
            height,
            noise,
            out,
        } => run_render(
            &calibration,
            pose_index,
            pattern.as_deref(),
            &display,
            &board,
            (width, height),
            noise.config(),
            &out,
        ),
        Commands::Corners {
            calibration,
            corner_cols,
            corner_rows,
            square_mm,
            width,
            height,
            out,
        } => {
            let config = CalibratorConfig {
                square_size_mm: square_mm,
                board_shape: (corner_cols, corner_rows),
                ..CalibratorConfig::default()
            };
            run_corners(&calibration, config, (width, height), &out)
        }
        Commands::Compare { a, b } => run_compare(&a, &b),
    }
}

fn run_simulate(
    args: &PendulumArgs,
    initial: PendulumState,
    t_max: f64,
    samples: usize,
    options: IntegratorOptions,
    out: &Path,
) -> Result<()> {
    let params = PendulumParameters::new(
        args.l_string,
        args.r_sphere,
        args.g,
        args.delta_theta,
        args.delta_phi,
    )
    .context("invalid pendulum parameters")?;
    let sim = PendulumSimulator::with_options(params, options);

    tracing::info!(
        length = params.length(),
        w0 = sim.w0(),
        t_max,
        samples,
        "simulating pendulum"
    );
    let traj = sim
        .simulate(initial, t_max, samples)
        .context("pendulum integration failed")?;

    let positions = sim.compute_cartesian(traj.states());
    let velocities = sim.compute_velocity(traj.states());
    let energy = sim.compute_energy(traj.states());

    let mut wtr = csv::Writer::from_path(out)
        .with_context(|| format!("CSV: cannot open {}", out.display()))?;
    wtr.write_record([
        "t", "theta", "phi", "dtheta", "dphi", "x", "y", "z", "vx", "vy", "vz", "e_kin", "e_pot",
        "e_tot",
    ])?;
    for (i, (t, s)) in traj.iter().enumerate() {
        let (p, v) = (positions[i], velocities[i]);
        let row = [
            t,
            s.theta,
            s.phi,
            s.dtheta,
            s.dphi,
            p.x,
            p.y,
            p.z,
            v.x,
            v.y,
            v.z,
            energy.kinetic[i],
            energy.potential[i],
            energy.total[i],
        ];
        wtr.write_record(row.iter().map(|x| x.to_string()))?;
    }
    wtr.flush()?;

    if let (Some(first), Some(last)) = (energy.total.first(), energy.total.last()) {
        tracing::info!(
            e_start = first,
            e_end = last,
            relative_change = (last - first) / first,
            "energy"
        );
    }
    tracing::info!("trajectory written to {}", out.display());
    Ok(())
}

fn run_checkerboard(display: &DisplayArgs, board: &BoardArgs, out: &Path) -> Result<()> {
    let display = display.display()?;
    let (pattern, square_mm) =
        generate_checkerboard(&display, (board.cols, board.rows), board.square_mm, board.invert)
            .context("cannot generate checkerboard")?;

    let (dpi_x, dpi_y) = display.dpi();
    let (rows, cols) = pattern.dim();
    tracing::info!(square_mm, dpi_x, dpi_y, width = cols, height = rows, "checkerboard");

    pendcam_io::save_pattern(out, &pattern)
        .with_context(|| format!("cannot write {}", out.display()))?;
    tracing::info!("checkerboard written to {}", out.display());
    Ok(())
}

fn run_calibrate(correspondences: &Path, config: CalibratorConfig, out: &Path) -> Result<()> {
    let set = pendcam_io::load_correspondences(correspondences)
        .with_context(|| format!("cannot read {}", correspondences.display()))?;

    let calibrator = CameraCalibrator::new(config);
    let calibration = calibrator
        .calibrate_correspondences(&set.observations, set.image_size)
        .context("calibration failed")?;

    let (object_sets, image_sets): (Vec<_>, Vec<_>) = calibration
        .used
        .iter()
        .map(|&i| {
            let obs = &set.observations[i];
            (obs.object_points.clone(), obs.image_points.clone())
        })
        .unzip();
    let mean_error = reprojection_error(&calibration.camera, &object_sets, &image_sets)?;

    let k = calibration.camera.intrinsics();
    tracing::info!(
        fx = k.fx,
        fy = k.fy,
        cx = k.cx,
        cy = k.cy,
        rms = calibration.rms,
        mean_error,
        views = calibration.used.len(),
        "calibration"
    );

    pendcam_io::save_calibration(out, &calibration.camera)
        .with_context(|| format!("cannot write {}", out.display()))?;
    tracing::info!("calibration written to {}", out.display());
    Ok(())
}

fn run_corners(
    calibration: &Path,
    board: CalibratorConfig,
    image_size: (u32, u32),
    out: &Path,
) -> Result<()> {
    let camera = pendcam_io::load_calibration(calibration)
        .with_context(|| format!("cannot read {}", calibration.display()))?;
    if camera.poses().is_empty() {
        bail!("{} holds no poses to project through", calibration.display());
    }

    let object_points = CameraCalibrator::new(board).object_points();
    let observations = camera
        .poses()
        .iter()
        .map(|pose| PlanarObservation {
            object_points: object_points.clone(),
            image_points: camera.project_with_pose(&object_points, pose),
        })
        .collect();
    let set = CorrespondenceSet {
        image_size,
        observations,
    };
    set.validate()?;

    pendcam_io::save_correspondences(out, &set)
        .with_context(|| format!("cannot write {}", out.display()))?;
    tracing::info!(
        views = set.observations.len(),
        corners = object_points.len(),
        "correspondences written to {}",
        out.display()
    );
    Ok(())
}

fn run_render(
    calibration: &Path,
    pose_index: usize,
    pattern: Option<&Path>,
    display: &DisplayArgs,
    board: &BoardArgs,
    output_size: (u32, u32),
    noise: Option<NoiseConfig>,
    out: &Path,
) -> Result<()> {
    let camera = pendcam_io::load_calibration(calibration)
        .with_context(|| format!("cannot read {}", calibration.display()))?;
    let Some(pose) = camera.poses().get(pose_index).copied() else {
        bail!(
            "calibration holds {} poses, pose {pose_index} requested",
            camera.poses().len()
        );
    };

    let display = display.display()?;
    let pattern = match pattern {
        Some(path) => pendcam_io::load_pattern(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        None => {
            generate_checkerboard(&display, (board.cols, board.rows), board.square_mm, board.invert)
                .context("cannot generate checkerboard")?
                .0
        }
    };
    let world_size_mm = display.world_size_mm(&pattern);

    let view = synthesize(&camera, &pattern, world_size_mm, output_size, &pose, noise.as_ref())
        .context("view synthesis failed")?;
    pendcam_io::save_gray(out, &view).with_context(|| format!("cannot write {}", out.display()))?;
    tracing::info!("view written to {}", out.display());
    Ok(())
}

fn run_compare(a: &Path, b: &Path) -> Result<()> {
    let img_a = pendcam_io::load_gray(a).with_context(|| format!("cannot read {}", a.display()))?;
    let img_b = pendcam_io::load_gray(b).with_context(|| format!("cannot read {}", b.display()))?;
    let error = mse(&img_a, &img_b)?;
    tracing::info!(mse = error, "pixel mean squared error");
    println!("{error}");
    Ok(())
}
