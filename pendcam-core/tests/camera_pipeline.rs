use nalgebra::{Point2, Point3, Vector3};
use ndarray::Array2;
use pendcam_core::synth::world_to_gray;
use pendcam_core::{
    CalibratorConfig, CameraCalibrator, CameraModel, Display, Distortion, NoiseConfig,
    PinholeIntrinsics, Pose, generate_checkerboard, mse, reprojection_error, synthesize,
};

/// Camera that maps world pixel `(c, r)` of a `cols x rows` plane with 1 mm
/// spacing back onto image pixel `(c, r)`
fn identity_rig(rows: usize, cols: usize) -> (CameraModel, Pose, (f64, f64)) {
    let f = 1000.0;
    let camera = CameraModel::ideal(PinholeIntrinsics::new(
        f,
        f,
        (cols - 1) as f64 / 2.0,
        (rows - 1) as f64 / 2.0,
    ));
    let pose = Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, f));
    (camera, pose, ((cols - 1) as f64, (rows - 1) as f64))
}

#[test]
fn identity_rig_reproduces_world_image() {
    let (rows, cols) = (40, 60);
    let world = Array2::from_shape_fn((rows, cols), |(r, c)| ((r / 8 + c / 8) % 2) as f64);
    let (camera, pose, size_mm) = identity_rig(rows, cols);

    let view = synthesize(&camera, &world, size_mm, (cols as u32, rows as u32), &pose, None).unwrap();
    let source = world_to_gray(&world);

    // Edge samples sit on the source boundary and may pick up the border
    for y in 1..rows as u32 - 1 {
        for x in 1..cols as u32 - 1 {
            assert_eq!(view.get_pixel(x, y), source.get_pixel(x, y), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn board_far_outside_view_renders_black() {
    let world = Array2::from_elem((20, 30), 1.0);
    let camera = CameraModel::ideal(PinholeIntrinsics::new(100.0, 100.0, 15.0, 10.0));
    let pose = Pose::new(Vector3::zeros(), Vector3::new(5000.0, 0.0, 100.0));

    let view = synthesize(&camera, &world, (30.0, 20.0), (30, 20), &pose, None).unwrap();
    assert!(view.pixels().all(|p| p[0] == 0));
}

#[test]
fn steeply_tilted_board_near_camera_plane_renders() {
    // Part of the board crosses the camera's z = 0 plane, where distortion
    // blows the projected coordinates up to ~1e19 px
    let camera = CameraModel::new(
        PinholeIntrinsics::new(800.0, 800.0, 320.0, 240.0).matrix(),
        Distortion::from_coeffs([-0.2, 0.1, 0.0, 0.0, 0.0]),
        Vec::new(),
    );
    let world = Array2::from_shape_fn((120, 180), |(r, c)| ((r / 20 + c / 20) % 2) as f64);
    let pose = Pose::new(Vector3::new(0.0, 1.045, 0.0), Vector3::new(0.0, 0.0, 50.0));

    let view = synthesize(&camera, &world, (180.0, 120.0), (180, 120), &pose, None).unwrap();
    assert_eq!(view.dimensions(), (180, 120));
}

#[test]
fn calibrate_render_and_compare() {
    let display = Display::new(0.344, 0.193, 1920, 1080).unwrap();
    let (pattern, square_mm) = generate_checkerboard(&display, (9, 6), None, false).unwrap();
    let world_size_mm = display.world_size_mm(&pattern);

    // Inner corners of the displayed board, observed by a known camera
    let calibrator = CameraCalibrator::new(CalibratorConfig {
        square_size_mm: square_mm,
        board_shape: (8, 5),
        estimate_distortion: false,
        ..CalibratorConfig::default()
    });
    let truth = CameraModel::ideal(PinholeIntrinsics::new(600.0, 600.0, 319.5, 239.5));
    let object = calibrator.object_points();
    let poses = [
        Pose::new(Vector3::new(0.2, 0.1, 0.0), Vector3::new(-120.0, -70.0, 500.0)),
        Pose::new(Vector3::new(-0.15, 0.25, 0.05), Vector3::new(-110.0, -80.0, 550.0)),
        Pose::new(Vector3::new(0.1, -0.2, -0.05), Vector3::new(-130.0, -60.0, 520.0)),
    ];
    let detections: Vec<Option<Vec<Point2<f64>>>> = poses
        .iter()
        .map(|pose| Some(truth.project_with_pose(&object, pose)))
        .collect();

    let calibration = calibrator.calibrate(&detections, (640, 480)).unwrap();
    assert!(calibration.rms < 1e-3, "rms {}", calibration.rms);

    let object_sets: Vec<Vec<Point3<f64>>> = vec![object.clone(); 3];
    let image_sets: Vec<Vec<Point2<f64>>> = detections.into_iter().flatten().collect();
    let err = reprojection_error(&calibration.camera, &object_sets, &image_sets).unwrap();
    assert!(err < 1e-3, "reprojection error {err}");

    let pose = calibration.camera.poses()[0];
    let clean = synthesize(&calibration.camera, &pattern, world_size_mm, (640, 480), &pose, None).unwrap();
    assert_eq!(clean.dimensions(), (640, 480));
    assert_eq!(mse(&clean, &clean).unwrap(), 0.0);

    let noise = NoiseConfig {
        gaussian_std: 5.0,
        poisson_lambda: 10.0,
        motion_blur: true,
        seed: 3,
    };
    let noisy_a = synthesize(&calibration.camera, &pattern, world_size_mm, (640, 480), &pose, Some(&noise)).unwrap();
    let noisy_b = synthesize(&calibration.camera, &pattern, world_size_mm, (640, 480), &pose, Some(&noise)).unwrap();
    assert_eq!(noisy_a, noisy_b);
    assert!(mse(&clean, &noisy_a).unwrap() > 0.0);
}
