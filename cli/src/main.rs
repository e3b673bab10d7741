mod render;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use stipple::color::gray_to_density;
use stipple::{DensityField, Observer, Params, PointMapping, Status, StippleResult, Stippler};

#[derive(Parser)]
#[command(about = "Weighted Linde-Buzo-Gray stippling")]
pub struct Options {
    /// Input images. Without any, a synthetic elliptical Gaussian is stippled.
    #[arg(long, short, value_delimiter = ',', num_args = 1..)]
    input: Vec<PathBuf>,

    /// One SVG per input, or a single SVG that receives every input.
    #[arg(long, short, value_delimiter = ',', num_args = 1.., required = true)]
    output: Vec<PathBuf>,

    #[arg(long, alias = "ip")]
    initial_points: Option<usize>,

    #[arg(long, alias = "ips")]
    initial_point_size: Option<f64>,

    /// Use the initial point size for every stipple.
    #[arg(long, alias = "cps")]
    constant_point_size: bool,

    #[arg(long, alias = "psmin")]
    point_size_min: Option<f64>,

    #[arg(long, alias = "psmax")]
    point_size_max: Option<f64>,

    /// Linear, SquareRoot, Exponential or Square, or their codes 0 to 3.
    #[arg(long, alias = "psmapping")]
    mapping: Option<PointMapping>,

    #[arg(long, alias = "ss")]
    super_sampling: Option<usize>,

    #[arg(long, alias = "iter")]
    max_iterations: Option<usize>,

    #[arg(long, alias = "hyst")]
    hysteresis: Option<f64>,

    #[arg(long, alias = "hystd")]
    hysteresis_delta: Option<f64>,

    /// JSON parameter file, its values win over the flags above.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Write the effective parameters as JSON.
    #[arg(long)]
    save_params: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Write the stipples of every input as JSON.
    #[arg(long)]
    stipples_json: Option<PathBuf>,

    /// Draw stipples created by the last split in red.
    #[arg(long)]
    color_new: bool,
}

struct LogObserver {
    name: String,
}

impl Observer for LogObserver {
    fn status(&mut self, status: &Status) {
        info!(
            "{}: iteration {}, {} points, {} splits, {} merges, hysteresis {:.3}",
            self.name,
            status.iteration,
            status.size,
            status.splits,
            status.merges,
            status.hysteresis
        );
    }
}

fn params_from(opt: &Options) -> Result<Params> {
    let mut params = Params::default();

    if let Some(v) = opt.initial_points {
        params.initial_points = v;
    }
    if let Some(v) = opt.initial_point_size {
        params.initial_point_size = v;
    }
    params.adaptive_point_size = !opt.constant_point_size;
    if let Some(v) = opt.point_size_min {
        params.point_size_min = v;
    }
    if let Some(v) = opt.point_size_max {
        params.point_size_max = v;
    }
    if let Some(v) = opt.mapping {
        params.mapping = v;
    }
    if let Some(v) = opt.super_sampling {
        params.super_sampling_factor = v;
    }
    if let Some(v) = opt.max_iterations {
        params.max_iterations = v;
    }
    if let Some(v) = opt.hysteresis {
        params.hysteresis = v;
    }
    if let Some(v) = opt.hysteresis_delta {
        params.hysteresis_delta = v;
    }

    if let Some(path) = &opt.params {
        let fh = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        params = serde_json::from_reader(fh)
            .with_context(|| format!("reading parameters from {}", path.display()))?;
    }

    params.validate()?;
    Ok(params)
}

/// Dark horizontal ellipse on white paper.
fn gaussian_density() -> Result<DensityField> {
    let (width, height) = (1920usize, 1080usize);
    let (sigma_x, sigma_y) = (179.0f64, 28.0f64);

    Ok(DensityField::from_fn(width, height, |x, y| {
        let dx = x as f64 - (width / 2) as f64;
        let dy = y as f64 - (height / 2) as f64;
        let g = (-(dx * dx / (2.0 * sigma_x * sigma_x) + dy * dy / (2.0 * sigma_y * sigma_y)))
            .exp();
        let gray = (((1.0 - g) * 255.0) as u8).min(254);
        gray_to_density(gray)
    })?)
}

struct Job {
    name: String,
    density: DensityField,
}

fn load_jobs(inputs: &[PathBuf]) -> Result<Vec<Job>> {
    if inputs.is_empty() {
        info!("No input given, using synthetic Gaussian");
        return Ok(vec![Job {
            name: "gaussian".into(),
            density: gaussian_density()?,
        }]);
    }

    inputs
        .iter()
        .map(|path| {
            let img = image::open(path).with_context(|| format!("loading {}", path.display()))?;
            Ok(Job {
                name: path.display().to_string(),
                density: DensityField::from_image(&img),
            })
        })
        .collect()
}

fn write_json(path: &Path, jobs: &[Job], results: &[StippleResult]) -> Result<()> {
    let sets = jobs
        .iter()
        .zip(results)
        .map(|(job, result)| {
            json!({
                "input": job.name,
                "width": job.density.width(),
                "height": job.density.height(),
                "stipples": result.stipples,
            })
        })
        .collect::<Vec<_>>();

    let fh = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(fh), &sets)?;
    Ok(())
}

fn layer<'a>(job: &Job, result: &'a StippleResult) -> render::Layer<'a> {
    render::Layer {
        stipples: &result.stipples,
        width: job.density.width() as u32,
        height: job.density.height() as u32,
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Options::parse();
    let params = params_from(&opt)?;

    if let Some(path) = &opt.save_params {
        let fh = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(fh, &params)?;
        info!("Saved parameters to {}", path.display());
    }

    let jobs = load_jobs(&opt.input)?;

    if opt.output.len() != 1 && opt.output.len() != jobs.len() {
        bail!(
            "{} inputs cannot be written to {} outputs",
            jobs.len(),
            opt.output.len()
        );
    }

    let mut rng = match opt.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    // SVG and JSON output only need the stipples
    let stippler = Stippler::new().without_weights();
    let mut results = Vec::with_capacity(jobs.len());

    for job in &jobs {
        let mut observer = LogObserver {
            name: job.name.clone(),
        };
        let result = stippler.run(&job.density, &params, &mut rng, &mut observer)?;

        info!(
            "{}: {} stipples ({:?} after {} iterations)",
            job.name,
            result.stipples.len(),
            result.termination,
            result.iterations
        );

        results.push(result);
    }

    if opt.output.len() == jobs.len() {
        for ((job, result), output) in jobs.iter().zip(&results).zip(&opt.output) {
            render::write_stipples(output, &[layer(job, result)], opt.color_new)?;
        }
    } else {
        let layers = jobs
            .iter()
            .zip(&results)
            .map(|(job, result)| layer(job, result))
            .collect::<Vec<_>>();
        render::write_stipples(&opt.output[0], &layers, opt.color_new)?;
    }

    if let Some(path) = &opt.stipples_json {
        write_json(path, &jobs, &results)?;
    }

    Ok(())
}
