use glam::DMat3;
use panokit_image::{Image, ImageFrame, ImageSize, PixelFormat};
use panokit_imgproc::filter::{gaussian_blur, kernels};
use panokit_imgproc::sharpness::is_sharp;
use panokit_stitching::blender::blend;
use panokit_stitching::seam::voronoi_seams;
use panokit_stitching::warper::{Roi, WarpedView};
use panokit_stitching::wave::wave_correct;
use panokit_stitching::{
    CameraParams, HostBitmap, HostImage, HostLayout, StitchConfig, StitchError, StitchStatus,
    Stitcher,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const BLOCK: usize = 8;

/// Random colored blocks, a texture with plenty of corners.
fn scene(width: usize, height: usize, seed: u64) -> Image<u8, 3> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (bw, bh) = (width.div_ceil(BLOCK), height.div_ceil(BLOCK));
    let colors: Vec<[u8; 3]> = (0..bw * bh)
        .map(|_| {
            [
                rng.random_range(30..=255),
                rng.random_range(30..=255),
                rng.random_range(30..=255),
            ]
        })
        .collect();
    Image::from_fn([width, height].into(), |x, y| {
        colors[(y / BLOCK) * bw + x / BLOCK]
    })
    .unwrap()
}

fn crop(scene: &Image<u8, 3>, x0: usize, width: usize) -> ImageFrame {
    let height = scene.height();
    let data = (0..height)
        .flat_map(|y| (x0..x0 + width).flat_map(move |x| scene.pixel(x, y).to_vec()))
        .collect();
    ImageFrame::new([width, height].into(), PixelFormat::Rgb8, data).unwrap()
}

fn three_views() -> Vec<ImageFrame> {
    let scene = scene(280, 120, 42);
    [0, 60, 120].iter().map(|&x| crop(&scene, x, 160)).collect()
}

fn covered_columns(frame: &ImageFrame) -> usize {
    let c = frame.format().channels();
    (0..frame.width())
        .filter(|&x| {
            (0..frame.height()).any(|y| {
                let idx = (y * frame.width() + x) * c;
                frame.as_bytes()[idx..idx + 3].iter().any(|&v| v > 0)
            })
        })
        .count()
}

#[test]
fn fewer_than_two_images_is_input_error() {
    let stitcher = Stitcher::default();
    let views = three_views();

    let none = stitcher.stitch(&[]);
    assert!(matches!(none, Err(StitchError::NotEnoughImages(0))));
    assert_eq!(StitchStatus::of(&none), StitchStatus::ErrorInput);

    let one = stitcher.stitch(&views[..1]);
    assert_eq!(StitchStatus::of(&one), StitchStatus::ErrorInput);
}

#[test]
fn zero_sized_frame_is_input_error() {
    // the checked constructor refuses empty frames
    assert!(ImageFrame::new(ImageSize::default(), PixelFormat::Rgb8, vec![]).is_err());

    let empty = ImageFrame::from(Image::<u8, 3>::from_size_val([0, 120].into(), 0).unwrap());
    let valid = three_views().remove(0);

    let result = Stitcher::default().stitch(&[valid, empty]);
    assert!(matches!(
        result,
        Err(StitchError::InvalidImage { index: 1, .. })
    ));
    assert_eq!(StitchStatus::of(&result), StitchStatus::ErrorInput);
}

#[test]
fn three_overlapping_views() -> Result<(), StitchError> {
    let views = three_views();
    let pano = Stitcher::default().stitch_detailed(&views)?;

    assert_eq!(pano.frame_indices, vec![0, 1, 2]);
    assert_eq!(pano.cameras.len(), 3);
    assert_eq!(pano.image.format(), PixelFormat::Rgb8);
    assert!(pano.image.width() > 160, "width {}", pano.image.width());
    // two views cover at most 220 columns of the scene
    assert!(covered_columns(&pano.image) > 220);
    Ok(())
}

#[test]
fn stitching_is_deterministic() -> Result<(), StitchError> {
    let views = three_views();
    let stitcher = Stitcher::new(StitchConfig::default());
    let first = stitcher.stitch(&views)?;
    let second = stitcher.stitch(&views)?;
    assert_eq!(first.size(), second.size());
    assert_eq!(first.as_bytes(), second.as_bytes());
    Ok(())
}

#[test]
fn alpha_input_gives_rgba_output() -> Result<(), StitchError> {
    let views: Vec<ImageFrame> = three_views()
        .iter()
        .map(|f| ImageFrame::from(f.to_rgba8().unwrap()))
        .collect();
    let pano = Stitcher::default().stitch(&views)?;
    assert_eq!(pano.format(), PixelFormat::Rgba8);
    assert!(pano.as_bytes().chunks_exact(4).any(|px| px[3] == 255));
    Ok(())
}

#[test]
fn zero_overlap_is_stitching_error() {
    let a = crop(&scene(160, 120, 1), 0, 160);
    let b = crop(&scene(160, 120, 2), 0, 160);
    let result = Stitcher::default().stitch(&[a, b]);
    assert_eq!(StitchStatus::of(&result), StitchStatus::ErrorStitching);
}

#[test]
fn host_round_trip_without_alpha() -> Result<(), panokit_stitching::ConversionError> {
    let mut rng = StdRng::seed_from_u64(7);
    let data: Vec<u8> = (0..17 * 9 * 3).map(|_| rng.random()).collect();
    let bitmap = HostBitmap::new(17, 9, HostLayout::Rgb8, data);
    let back = HostBitmap::from_frame(&bitmap.to_frame(false)?).unwrap();
    assert_eq!(back, bitmap);
    Ok(())
}

#[test]
fn blurred_frame_is_not_sharp() {
    let size: ImageSize = [64, 64].into();
    let sharp = Image::<u8, 1>::from_fn(size, |x, y| {
        [if ((x / 4) + (y / 4)) % 2 == 0 { 10 } else { 240 }]
    })
    .unwrap();

    let src = sharp.cast::<f32>().unwrap();
    let mut blurred = Image::<f32, 1>::from_size_val(size, 0.0).unwrap();
    let k = kernels::gaussian_kernel_size(4.0);
    gaussian_blur(&src, &mut blurred, (k, k), (4.0, 4.0)).unwrap();
    let blurred = Image::<u8, 1>::new(
        size,
        blurred.as_slice().iter().map(|v| v.round() as u8).collect(),
    )
    .unwrap();

    assert!(is_sharp(&ImageFrame::from(sharp), 100.0).unwrap());
    assert!(!is_sharp(&ImageFrame::from(blurred), 100.0).unwrap());
}

fn transition_width(strength: f64) -> usize {
    let (height, y) = (60usize, 30usize);
    let view = |x: i64, width: usize, value: f32| {
        let size = ImageSize { width, height };
        WarpedView {
            roi: Roi {
                x,
                y: 0,
                width,
                height,
            },
            image: Image::from_size_val(size, value).unwrap(),
            mask: Image::from_size_val(size, 255).unwrap(),
        }
    };
    let views = vec![view(0, 200, 0.0), view(80, 200, 1.0)];
    let canvas = views[0].roi.union(&views[1].roi);
    let seams = voronoi_seams(&views, &canvas).unwrap();
    let result = blend(&views, &seams, &canvas, strength).unwrap();

    (0..canvas.width)
        .filter(|&x| {
            let v = result.image.pixel(x, y)[0];
            v > 0.02 && v < 0.98
        })
        .count()
}

#[test]
fn blending_strength_widens_transition() {
    let widths: Vec<usize> = [2.0, 8.0, 20.0].iter().map(|&s| transition_width(s)).collect();
    assert_eq!(transition_width(0.0), 0);
    assert!(widths[0] > 0);
    assert!(
        widths.windows(2).all(|w| w[0] < w[1]),
        "transition widths {widths:?}"
    );
}

#[test]
fn wave_correction_levels_cameras() {
    let tilt = DMat3::from_rotation_x(0.12) * DMat3::from_rotation_z(-0.08);
    let cameras: Vec<CameraParams> = [-0.3, 0.0, 0.3]
        .iter()
        .map(|&yaw| CameraParams {
            rotation: tilt * DMat3::from_rotation_y(yaw),
            ..CameraParams::new(400.0, 320, 240)
        })
        .collect();

    let uprightness = |cams: &[CameraParams]| -> f64 {
        cams.iter().map(|c| c.rotation.y_axis.y.abs()).sum::<f64>() / cams.len() as f64
    };

    let mut corrected = cameras.clone();
    wave_correct(&mut corrected);
    assert!(uprightness(&corrected) > uprightness(&cameras));
    assert!((uprightness(&corrected) - 1.0).abs() < 1e-9);
}

#[test]
fn wave_correction_flag_gates_the_stage() -> Result<(), StitchError> {
    let views = three_views();
    let with_flag = |wave_correction| {
        Stitcher::new(StitchConfig {
            wave_correction,
            ..Default::default()
        })
        .stitch_detailed(&views)
    };

    let corrected = with_flag(true)?;
    let raw = with_flag(false)?;
    assert_eq!(raw.frame_indices, corrected.frame_indices);

    // the only difference between both runs is the correction of the estimated cameras
    let mut expected = raw.cameras.clone();
    wave_correct(&mut expected);
    assert_eq!(corrected.cameras, expected);
    Ok(())
}
