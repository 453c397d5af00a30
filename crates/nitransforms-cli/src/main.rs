use anyhow::{bail, Context, Result};
use burn_ndarray::{NdArray, NdArrayDevice};
use clap::{Parser, Subcommand};
use nitransforms_core::interpolation::{ExtendMode, SplineOrder};
use nitransforms_core::{Affine, DataType, ImageSeries, ResampleOptions, Resampled, ResampledSeries, SpatialReference};
use nitransforms_io::{load, read_nifti, save_transform, write_nifti, write_nifti_series, Linear, NiftiImage};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Backend = NdArray<f32>;

#[derive(Parser, Debug)]
#[command(name = "nb-transform")]
#[command(about = "Apply, invert and inspect spatial transforms of neuroimaging data")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resample an image through a transform
    Apply {
        /// Transform document (JSON)
        #[arg(short, long)]
        transform: PathBuf,

        /// Image to resample (3-D or 4-D NIfTI)
        #[arg(short, long)]
        moving: PathBuf,

        /// Image defining the output grid; defaults to the transform's reference
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Output NIfTI file
        #[arg(short, long)]
        output: PathBuf,

        /// Spline order, 0 (nearest) to 5
        #[arg(long, default_value_t = 3)]
        order: u8,

        /// Extension mode: constant, nearest, reflect, mirror, wrap, grid-wrap
        #[arg(long, default_value = "constant")]
        mode: String,

        /// Fill value for the constant mode
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        cval: f64,

        /// Use raw voxel values as spline coefficients
        #[arg(long)]
        no_prefilter: bool,

        /// Output data type (uint8, int16, int32, float32, float64)
        #[arg(long)]
        output_dtype: Option<String>,
    },

    /// Invert a transform
    Invert {
        #[arg(short, long)]
        transform: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Compose affines, applied first to last
    Compose {
        #[arg(short, long)]
        output: PathBuf,

        /// Transform documents, each holding a single affine
        #[arg(required = true, num_args = 1..)]
        transforms: Vec<PathBuf>,
    },

    /// Print a summary of a transform document
    Info {
        #[arg(short, long)]
        transform: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Apply {
            transform,
            moving,
            reference,
            output,
            order,
            mode,
            cval,
            no_prefilter,
            output_dtype,
        } => {
            let mut options = ResampleOptions::default()
                .with_order(SplineOrder::new(order)?)
                .with_mode(mode.parse::<ExtendMode>()?)
                .with_cval(cval)
                .with_prefilter(!no_prefilter);
            if let Some(dtype) = output_dtype {
                options = options.with_output_dtype(dtype.parse::<DataType>()?);
            }
            apply(&transform, &moving, reference.as_deref(), &output, &options)?;
        }
        Commands::Invert { transform, output } => {
            let linear = load::<3, _>(&transform)?;
            let inverse = linear.inverse().context("Transform is not invertible")?;
            save_transform(&output, &inverse)?;
            info!("Wrote inverse to {}", output.display());
        }
        Commands::Compose { output, transforms } => {
            compose(&transforms, &output)?;
        }
        Commands::Info { transform } => {
            print!("{}", describe(&load::<3, _>(&transform)?));
        }
    }

    Ok(())
}

fn apply(
    transform: &Path,
    moving: &Path,
    reference: Option<&Path>,
    output: &Path,
    options: &ResampleOptions,
) -> Result<()> {
    let device = NdArrayDevice::default();
    let linear = load::<3, _>(transform)?;
    let moving = read_nifti::<Backend, _>(moving, &device)?;

    let reference = match reference {
        Some(path) => Some(SpatialReference::Grid(*read_nifti::<Backend, _>(path, &device)?.grid())),
        None if linear.reference().is_some() => None,
        None => {
            info!("No reference given, resampling onto the moving grid");
            Some(SpatialReference::Grid(*moving.grid()))
        }
    };
    let reference = reference.as_ref();

    info!(
        transforms = linear.len(),
        timepoints = moving.timepoints(),
        "Resampling {}",
        output.display()
    );

    match (linear, moving) {
        (Linear::Affine(affine), NiftiImage::Volume(image)) => {
            match affine.apply(&image, reference, options)? {
                Resampled::Image(image) => write_nifti(output, &image)?,
                Resampled::Values(_) => bail!("Expected an image output"),
            }
        }
        (Linear::Affine(affine), NiftiImage::Series(series)) => {
            let volumes = series
                .iter()
                .map(|volume| {
                    affine
                        .apply(&volume, reference, options)?
                        .into_image()
                        .context("Expected an image output")
                })
                .collect::<Result<Vec<_>>>()?;
            write_nifti_series(output, &ImageSeries::from_images(volumes)?)?;
        }
        (Linear::Mapping(mapping), NiftiImage::Volume(image)) => {
            write_series(output, mapping.apply(&image, reference, options)?)?;
        }
        (Linear::Mapping(mapping), NiftiImage::Series(series)) => {
            write_series(output, mapping.apply_series(&series, reference, options)?)?;
        }
    }

    info!("Wrote {}", output.display());
    Ok(())
}

fn write_series(output: &Path, resampled: ResampledSeries<Backend, 3>) -> Result<()> {
    match resampled {
        ResampledSeries::Series(series) => write_nifti_series(output, &series),
        ResampledSeries::Values(_) => bail!("Expected an image output"),
    }
}

fn compose(paths: &[PathBuf], output: &Path) -> Result<()> {
    let mut composed: Option<Affine<3>> = None;
    for path in paths {
        let affine = match load::<3, _>(path)? {
            Linear::Affine(affine) => affine,
            Linear::Mapping(_) => bail!("{} holds a transform series, expected one affine", path.display()),
        };
        composed = Some(match composed {
            Some(previous) => previous.compose(&affine),
            None => affine,
        });
    }
    let composed = composed.context("No transform to compose")?;
    save_transform(output, &Linear::Affine(composed))?;
    info!("Composed {} transforms into {}", paths.len(), output.display());
    Ok(())
}

fn describe(linear: &Linear<3>) -> String {
    let kind = match linear {
        Linear::Affine(_) => "affine",
        Linear::Mapping(_) => "linear mapping",
    };
    let mut text = format!("type: {}\ndimension: 3\ntransforms: {}\n", kind, linear.len());
    if let Some(SpatialReference::Grid(grid)) = linear.reference() {
        text.push_str(&format!(
            "reference: shape {:?}, axes {}\n",
            grid.shape(),
            grid.axis_codes().unwrap_or_else(|| "oblique".to_string())
        ));
    }
    for (i, affine) in linear.affines().iter().enumerate() {
        text.push_str(&format!("[{}] determinant {:.6}\n", i, affine.determinant()));
        for row in affine.matrix().row_iter() {
            let cells: Vec<String> = row.iter().map(|v| format!("{:>12.6}", v)).collect();
            text.push_str(&cells.join(" "));
            text.push('\n');
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use nitransforms_core::spatial::{Direction, Point, Spacing, Vector};
    use nitransforms_core::{Image, ImageGrid};
    use tempfile::tempdir;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from([
            "nb-transform", "-vv", "apply", "-t", "x.json", "-m", "in.nii", "-o", "out.nii",
            "--order", "1", "--mode", "nearest", "--cval", "-1", "--no-prefilter",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Apply { order, cval, no_prefilter, reference, .. } => {
                assert_eq!(order, 1);
                assert_eq!(cval, -1.0);
                assert!(no_prefilter);
                assert!(reference.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["nb-transform", "invert", "-t", "a.json", "-o", "b.json"]).is_ok());
        assert!(Cli::try_parse_from(["nb-transform", "compose", "-o", "c.json", "a.json", "b.json"]).is_ok());
        assert!(Cli::try_parse_from(["nb-transform", "compose", "-o", "c.json"]).is_err());
        assert!(Cli::try_parse_from(["nb-transform", "info", "-t", "a.json"]).is_ok());
        assert!(Cli::try_parse_from(["nb-transform", "frobnicate"]).is_err());
    }

    #[test]
    fn test_apply_shift_end_to_end() -> Result<()> {
        let dir = tempdir()?;
        let device = NdArrayDevice::default();
        let grid = ImageGrid::new([4, 4, 4], Point::new([0.0, 0.0, 0.0]), Spacing::new([1.0, 1.0, 1.0]), Direction::identity());
        let values = grid.ndindex().map(|[i, _, _]| i as f32).collect();
        let image = Image::<Backend, 3>::from_values(values, grid, &device)?;
        let moving = dir.path().join("moving.nii");
        write_nifti(&moving, &image)?;

        let xfm = dir.path().join("shift.json");
        save_transform(&xfm, &Linear::Affine(Affine::from_translation(Vector::new([1.0, 0.0, 0.0]))))?;

        let output = dir.path().join("out.nii");
        let args: Vec<std::ffi::OsString> = vec![
            "nb-transform".into(), "apply".into(),
            "-t".into(), xfm.into(),
            "-m".into(), moving.into(),
            "-o".into(), output.clone().into(),
            "--order".into(), "1".into(),
            "--cval".into(), "-5".into(),
        ];
        let cli = Cli::try_parse_from(args)?;
        run(cli)?;

        let NiftiImage::Volume(result) = read_nifti::<Backend, _>(&output, &device)? else {
            bail!("expected a volume");
        };
        let array = result.to_array()?;
        assert!((array[[0, 2, 2]] - 1.0).abs() < 1e-4);
        assert!((array[[2, 0, 3]] - 3.0).abs() < 1e-4);
        assert_eq!(array[[3, 1, 1]], -5.0);
        Ok(())
    }

    #[test]
    fn test_invert_compose_info() -> Result<()> {
        let dir = tempdir()?;
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        let inv = dir.path().join("inv.json");
        let both = dir.path().join("both.json");
        save_transform(&a, &Linear::Affine(Affine::from_scale(Vector::new([2.0, 2.0, 2.0]))))?;
        save_transform(&b, &Linear::Affine(Affine::from_translation(Vector::new([1.0, 0.0, 0.0]))))?;

        run(Cli::try_parse_from(["nb-transform", "invert", "-t", a.to_str().context("path")?, "-o", inv.to_str().context("path")?])?)?;
        let Linear::Affine(inverse) = load::<3, _>(&inv)? else {
            bail!("expected an affine");
        };
        assert_eq!(inverse, Affine::from_scale(Vector::new([0.5, 0.5, 0.5])));

        run(Cli::try_parse_from([
            "nb-transform", "compose", "-o", both.to_str().context("path")?,
            a.to_str().context("path")?, b.to_str().context("path")?,
        ])?)?;
        let composed = load::<3, _>(&both)?;
        let text = describe(&composed);
        assert!(text.starts_with("type: affine"));
        assert!(text.contains("determinant 8.000000"));
        let Linear::Affine(composed) = composed else {
            bail!("expected an affine");
        };
        let p = composed.map_point(&Point::new([1.0, 1.0, 1.0]), false)?;
        assert_eq!(p, Point::new([3.0, 2.0, 2.0]));
        Ok(())
    }
}
