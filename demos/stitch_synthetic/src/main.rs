use argh::FromArgs;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;

use panokit::image::{Image, ImageFrame, PixelFormat};
use panokit::stitching::{is_sharp_host, HostImage, StitchConfig, StitchStatus, Stitcher};

#[derive(FromArgs)]
/// Stitch overlapping views into a panorama and write it as an image file
struct Args {
    /// path to the output image
    #[argh(option, short = 'o', default = "PathBuf::from(\"panorama.png\")")]
    output: PathBuf,

    /// input images, ordered left to right. A synthetic scene is used when none is given
    #[argh(option, short = 'i')]
    image: Vec<PathBuf>,

    /// number of synthetic views
    #[argh(option, default = "4")]
    views: usize,

    /// seed of the synthetic scene
    #[argh(option, default = "0")]
    seed: u64,

    /// json file with the stitching configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// drop input images whose sharpness is below this threshold
    #[argh(option)]
    min_sharpness: Option<f64>,
}

const VIEW_WIDTH: usize = 320;
const VIEW_HEIGHT: usize = 240;

/// A scene of colored blocks with a vertical gradient, wide enough for `views` crops.
fn synthetic_scene(views: usize, seed: u64) -> Result<Image<u8, 3>, Box<dyn std::error::Error>> {
    let width = VIEW_WIDTH + (views.max(2) - 1) * VIEW_WIDTH / 2;
    let block = 12;
    let (bw, bh) = (width / block + 1, VIEW_HEIGHT / block + 1);

    let mut rng = StdRng::seed_from_u64(seed);
    let colors: Vec<[u8; 3]> = (0..bw * bh)
        .map(|_| [rng.random_range(40..=255), rng.random_range(40..=255), rng.random_range(40..=255)])
        .collect();

    let scene = Image::from_fn([width, VIEW_HEIGHT].into(), |x, y| {
        let shade = 0.6 + 0.4 * y as f32 / VIEW_HEIGHT as f32;
        colors[(y / block) * bw + x / block].map(|c| (c as f32 * shade) as u8)
    })?;
    Ok(scene)
}

fn crop(scene: &Image<u8, 3>, x0: usize) -> Result<ImageFrame, Box<dyn std::error::Error>> {
    let data = (0..scene.height())
        .flat_map(|y| (x0..x0 + VIEW_WIDTH).flat_map(move |x| scene.pixel(x, y).to_vec()))
        .collect();
    Ok(ImageFrame::new(
        [VIEW_WIDTH, scene.height()].into(),
        PixelFormat::Rgb8,
        data,
    )?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => StitchConfig::default(),
    };
    log::info!("config: {}", serde_json::to_string(&config)?);

    let frames = if args.image.is_empty() {
        let scene = synthetic_scene(args.views, args.seed)?;
        let step = VIEW_WIDTH / 2;
        (0..args.views.max(2))
            .map(|i| crop(&scene, i * step))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        let mut frames = Vec::with_capacity(args.image.len());
        for path in &args.image {
            let img = image::open(path)?;
            if let Some(threshold) = args.min_sharpness {
                if !is_sharp_host(&img, threshold)? {
                    log::warn!("skipping blurry image {}", path.display());
                    continue;
                }
            }
            frames.push(img.to_frame(true)?);
        }
        frames
    };

    let stitcher = Stitcher::new(config);
    let result = stitcher.stitch_detailed(&frames);
    let status = StitchStatus::of(&result);
    let pano = match result {
        Ok(pano) => pano,
        Err(e) => {
            log::error!("stitching failed with {status:?}: {e}");
            return Err(e.into());
        }
    };

    for (i, cam) in pano.frame_indices.iter().zip(pano.cameras.iter()) {
        log::info!("frame {i}: focal {:.1}", cam.focal);
    }

    let out = image::DynamicImage::from_frame(&pano.image).ok_or("unsupported output format")?;
    out.save(&args.output)?;

    println!(
        "{status:?}: {}x{} panorama from {} frames written to {}",
        pano.image.width(),
        pano.image.height(),
        pano.frame_indices.len(),
        args.output.display()
    );

    Ok(())
}
