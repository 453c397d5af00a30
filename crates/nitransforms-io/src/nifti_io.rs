use anyhow::{bail, Context, Result};
use burn::tensor::backend::Backend;
use nalgebra::DMatrix;
use ndarray::{ArrayD, Axis, IxDyn};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, NiftiType, ReaderOptions};
use nitransforms_core::{DataType, Image, ImageGrid, ImageSeries};
use std::path::Path;
use tracing::debug;

/// `xform_code` for a transform aligning to another file's space.
const XFORM_ALIGNED: i16 = 2;
/// Millimetres and seconds.
const UNITS_MM_SEC: u8 = 2 | 8;

/// Contents of a NIfTI file.
#[derive(Debug, Clone)]
pub enum NiftiImage<B: Backend> {
    /// A 2-D or 3-D image (2-D data becomes a single slice).
    Volume(Image<B, 3>),
    /// A 4-D image: one volume per timepoint.
    Series(ImageSeries<B, 3>),
}

impl<B: Backend> NiftiImage<B> {
    /// The voxel grid shared by all volumes.
    pub fn grid(&self) -> &ImageGrid<3> {
        match self {
            Self::Volume(image) => image.grid(),
            Self::Series(series) => series.grid(),
        }
    }

    /// Storage type recorded in the header.
    pub fn dtype(&self) -> DataType {
        match self {
            Self::Volume(image) => image.dtype(),
            Self::Series(series) => series.dtype(),
        }
    }

    /// Number of timepoints (1 for a volume).
    pub fn timepoints(&self) -> usize {
        match self {
            Self::Volume(_) => 1,
            Self::Series(series) => series.len(),
        }
    }
}

/// Voxel-to-physical matrix of a header: sform, else qform, else pixdim.
pub fn header_affine(header: &NiftiHeader) -> DMatrix<f64> {
    let rows: [[f32; 4]; 3] = if header.sform_code > 0 {
        [header.srow_x, header.srow_y, header.srow_z]
    } else if header.qform_code > 0 {
        // Quaternion form, see the NIfTI-1 standard
        let b = header.quatern_b;
        let c = header.quatern_c;
        let d = header.quatern_d;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };

        let r11 = a * a + b * b - c * c - d * d;
        let r12 = 2.0 * b * c - 2.0 * a * d;
        let r13 = 2.0 * b * d + 2.0 * a * c;

        let r21 = 2.0 * b * c + 2.0 * a * d;
        let r22 = a * a + c * c - b * b - d * d;
        let r23 = 2.0 * c * d - 2.0 * a * b;

        let r31 = 2.0 * b * d - 2.0 * a * c;
        let r32 = 2.0 * c * d + 2.0 * a * b;
        let r33 = a * a + d * d - c * c - b * b;

        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3] * qfac;

        [
            [r11 * dx, r12 * dy, r13 * dz, header.quatern_x],
            [r21 * dx, r22 * dy, r23 * dz, header.quatern_y],
            [r31 * dx, r32 * dy, r33 * dz, header.quatern_z],
        ]
    } else {
        // Fallback: pixdim scaling only
        let spacing = |i: usize| if header.pixdim[i] > 0.0 { header.pixdim[i] } else { 1.0 };
        [
            [spacing(1), 0.0, 0.0, 0.0],
            [0.0, spacing(2), 0.0, 0.0],
            [0.0, 0.0, spacing(3), 0.0],
        ]
    };

    let mut affine = DMatrix::<f64>::identity(4, 4);
    for (r, row) in rows.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            affine[(r, c)] = f64::from(v);
        }
    }
    affine
}

fn header_dtype(header: &NiftiHeader) -> DataType {
    match header.data_type() {
        Ok(NiftiType::Int8) => DataType::Int8,
        Ok(NiftiType::Uint8) => DataType::Uint8,
        Ok(NiftiType::Int16) => DataType::Int16,
        Ok(NiftiType::Uint16) => DataType::Uint16,
        Ok(NiftiType::Int32) => DataType::Int32,
        Ok(NiftiType::Uint32) => DataType::Uint32,
        Ok(NiftiType::Int64) => DataType::Int64,
        Ok(NiftiType::Uint64) => DataType::Uint64,
        Ok(NiftiType::Float64) => DataType::Float64,
        // Complex, RGB and extended floats are read as float32 magnitudes.
        _ => DataType::Float32,
    }
}

/// Read a NIfTI-1 file (`.nii` or `.nii.gz`).
///
/// Voxel `(i, j, k)` of the file is `data[[i, j, k]]` of the image. A 4-D
/// file holding a single timepoint is read as a volume.
pub fn read_nifti<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<NiftiImage<B>> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {}", path.display()))?;
    let header = obj.header().clone();
    let affine = header_affine(&header);
    let dtype = header_dtype(&header);

    let array = obj
        .into_volume()
        .into_ndarray::<f32>()
        .context("Failed to convert volume to ndarray")?;
    let shape = array.shape().to_vec();
    debug!(path = %path.display(), ?shape, %dtype, "read NIfTI");

    if !(2..=4).contains(&shape.len()) {
        bail!("Expected a 2-D, 3-D or 4-D NIfTI file, found {} dimensions", shape.len());
    }
    let spatial = [shape[0], shape.get(1).copied().unwrap_or(1), shape.get(2).copied().unwrap_or(1)];
    let grid = ImageGrid::from_affine(spatial, &affine).context("Invalid voxel-to-world matrix in header")?;

    match shape.get(3) {
        Some(&timepoints) if timepoints > 1 => {
            let volumes = array
                .axis_iter(Axis(3))
                .map(|volume| {
                    let values: Vec<f32> = volume.iter().copied().collect();
                    Image::<B, 3>::from_values(values, grid, device)
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let series = ImageSeries::from_images(volumes)?.with_dtype(dtype);
            Ok(NiftiImage::Series(series))
        }
        _ => {
            let values: Vec<f32> = array.iter().copied().collect();
            let image = Image::from_values(values, grid, device)?.with_dtype(dtype);
            Ok(NiftiImage::Volume(image))
        }
    }
}

/// Header carrying the grid geometry in the sform.
fn reference_header(grid: &ImageGrid<3>) -> NiftiHeader {
    let affine = grid.affine();
    let row = |r: usize| -> [f32; 4] {
        [
            affine[(r, 0)] as f32,
            affine[(r, 1)] as f32,
            affine[(r, 2)] as f32,
            affine[(r, 3)] as f32,
        ]
    };
    let spacing = grid.spacing();
    let mut pixdim = [1.0f32; 8];
    for i in 0..3 {
        pixdim[i + 1] = spacing[i] as f32;
    }
    NiftiHeader {
        pixdim,
        sform_code: XFORM_ALIGNED,
        qform_code: 0,
        srow_x: row(0),
        srow_y: row(1),
        srow_z: row(2),
        xyzt_units: UNITS_MM_SEC,
        ..NiftiHeader::default()
    }
}

fn write_array(path: &Path, header: &NiftiHeader, array: ArrayD<f32>, dtype: DataType) -> Result<()> {
    let writer = WriterOptions::new(path).reference_header(header);
    let written = match dtype {
        DataType::Int8 => writer.write_nifti(&array.mapv(|v| dtype.cast(v.into()) as i8)),
        DataType::Uint8 => writer.write_nifti(&array.mapv(|v| dtype.cast(v.into()) as u8)),
        DataType::Int16 => writer.write_nifti(&array.mapv(|v| dtype.cast(v.into()) as i16)),
        DataType::Uint16 => writer.write_nifti(&array.mapv(|v| dtype.cast(v.into()) as u16)),
        DataType::Int32 => writer.write_nifti(&array.mapv(|v| dtype.cast(v.into()) as i32)),
        DataType::Uint32 => writer.write_nifti(&array.mapv(|v| dtype.cast(v.into()) as u32)),
        DataType::Int64 => writer.write_nifti(&array.mapv(|v| dtype.cast(v.into()) as i64)),
        DataType::Uint64 => writer.write_nifti(&array.mapv(|v| dtype.cast(v.into()) as u64)),
        DataType::Float32 => writer.write_nifti(&array),
        DataType::Float64 => writer.write_nifti(&array.mapv(f64::from)),
    };
    written.with_context(|| format!("Failed to write NIfTI file {}", path.display()))
}

/// Write an image to a NIfTI file, storing its grid in the sform.
///
/// Voxels are stored with the image's data type.
pub fn write_nifti<B: Backend, P: AsRef<Path>>(path: P, image: &Image<B, 3>) -> Result<()> {
    let path = path.as_ref();
    let array = ArrayD::from_shape_vec(IxDyn(&image.shape()), image.to_values()?)
        .context("Failed to create ndarray")?;
    debug!(path = %path.display(), shape = ?image.shape(), dtype = %image.dtype(), "write NIfTI");
    write_array(path, &reference_header(image.grid()), array, image.dtype())
}

/// Write a series as a 4-D NIfTI file.
pub fn write_nifti_series<B: Backend, P: AsRef<Path>>(path: P, series: &ImageSeries<B, 3>) -> Result<()> {
    let path = path.as_ref();
    let shape = series.grid().shape();
    let volumes = series
        .iter()
        .map(|volume| {
            let values = volume.to_values()?;
            ArrayD::from_shape_vec(IxDyn(&shape), values).context("Failed to create ndarray")
        })
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<_> = volumes.iter().map(|v| v.view()).collect();
    let array = ndarray::stack(Axis(3), &views).context("Failed to stack volumes")?;
    debug!(path = %path.display(), ?shape, timepoints = series.len(), "write NIfTI series");
    write_array(path, &reference_header(series.grid()), array, series.dtype())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nitransforms_core::spatial::{Direction, Point, Spacing};
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    fn oblique_grid() -> ImageGrid<3> {
        let rotation = nalgebra::Rotation3::from_euler_angles(0.1, -0.2, 0.3);
        ImageGrid::new(
            [3, 4, 5],
            Point::new([-10.0, 20.5, 3.0]),
            Spacing::new([1.0, 2.0, 2.5]),
            Direction(*rotation.matrix()),
        )
    }

    #[test]
    fn test_read_nifti_basic() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.nii");

        // Array3 shape (3, 4, 5) -> X=3, Y=4, Z=5.
        let data: Vec<f32> = (0..3 * 4 * 5).map(|x| x as f32).collect();
        let array = ndarray::Array3::from_shape_vec((3, 4, 5), data)?;
        WriterOptions::new(&file_path).write_nifti(&array)?;

        let device = Default::default();
        let image = match read_nifti::<TestBackend, _>(&file_path, &device)? {
            NiftiImage::Volume(image) => image,
            NiftiImage::Series(_) => bail!("expected a volume"),
        };
        assert_eq!(image.shape(), [3, 4, 5]);

        let values = image.to_array()?;
        assert_eq!(values[[0, 0, 1]], 1.0);
        assert_eq!(values[[1, 0, 0]], 20.0);
        assert_eq!(values[[2, 3, 4]], 59.0);
        Ok(())
    }

    #[test]
    fn test_write_read_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("roundtrip.nii.gz");
        let device = Default::default();

        let grid = oblique_grid();
        let values: Vec<f32> = (0..grid.npoints()).map(|x| x as f32 * 0.5).collect();
        let image = Image::<TestBackend, 3>::from_values(values.clone(), grid, &device)?;
        write_nifti(&file_path, &image)?;

        let loaded = read_nifti::<TestBackend, _>(&file_path, &device)?;
        assert_eq!(loaded.grid(), &grid);
        assert_eq!(loaded.timepoints(), 1);
        let NiftiImage::Volume(loaded) = loaded else {
            bail!("expected a volume");
        };
        assert_eq!(loaded.to_values()?, values);
        Ok(())
    }

    #[test]
    fn test_series_roundtrip_with_dtype() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("series.nii");
        let device = Default::default();

        let grid = ImageGrid::new([2, 3, 4], Point::new([1.0, 2.0, 3.0]), Spacing::new([2.0, 2.0, 2.0]), Direction::identity());
        let volumes = (0..3)
            .map(|t| {
                let values = (0..24).map(|v| (v + 100 * t) as f32).collect();
                Image::<TestBackend, 3>::from_values(values, grid, &device)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let series = ImageSeries::from_images(volumes)?.with_dtype(DataType::Int16);
        write_nifti_series(&file_path, &series)?;

        let loaded = read_nifti::<TestBackend, _>(&file_path, &device)?;
        assert_eq!(loaded.dtype(), DataType::Int16);
        let NiftiImage::Series(loaded) = loaded else {
            bail!("expected a series");
        };
        assert_eq!(loaded.len(), 3);
        let third = loaded.volume(2).context("missing volume")?.to_array()?;
        assert_eq!(third[[0, 0, 0]], 200.0);
        assert_eq!(third[[1, 2, 3]], 223.0);
        Ok(())
    }

    #[test]
    fn test_single_timepoint_reads_as_volume() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("single.nii");
        let data: Vec<f32> = (0..2 * 3 * 4).map(|x| x as f32).collect();
        let array = ndarray::Array4::from_shape_vec((2, 3, 4, 1), data)?;
        WriterOptions::new(&file_path).write_nifti(&array)?;

        let device = Default::default();
        let NiftiImage::Volume(image) = read_nifti::<TestBackend, _>(&file_path, &device)? else {
            bail!("expected a volume");
        };
        assert_eq!(image.shape(), [2, 3, 4]);
        assert_eq!(image.to_array()?[[1, 2, 3]], 23.0);
        Ok(())
    }

    #[test]
    fn test_unsigned_and_narrow_dtypes() -> Result<()> {
        let dir = tempdir()?;
        let device = Default::default();

        let raw_path = dir.path().join("uint16.nii");
        let array = ndarray::Array3::from_shape_fn((2, 2, 2), |(i, j, k)| (i * 40000 + j * 10 + k) as u16);
        WriterOptions::new(&raw_path).write_nifti(&array)?;
        let loaded = read_nifti::<TestBackend, _>(&raw_path, &device)?;
        assert_eq!(loaded.dtype(), DataType::Uint16);

        let grid = ImageGrid::from_shape([2, 2, 2]);
        for dtype in [DataType::Int8, DataType::Uint16, DataType::Uint32, DataType::Int64] {
            let file_path = dir.path().join(format!("{dtype}.nii"));
            let values = vec![-300.0, -1.4, 0.0, 2.6, 127.0, 1000.0, 40000.5, 70000.0];
            let image = Image::<TestBackend, 3>::from_values(values.clone(), grid, &device)?.with_dtype(dtype);
            write_nifti(&file_path, &image)?;

            let NiftiImage::Volume(loaded) = read_nifti::<TestBackend, _>(&file_path, &device)? else {
                bail!("expected a volume");
            };
            assert_eq!(loaded.dtype(), dtype);
            let expected: Vec<f32> = values.iter().map(|&v| dtype.cast(f64::from(v)) as f32).collect();
            assert_eq!(loaded.to_values()?, expected, "{dtype}");
        }
        Ok(())
    }

    #[test]
    fn test_qform_affine() {
        let header = NiftiHeader {
            qform_code: 1,
            sform_code: 0,
            pixdim: [1.0, 2.0, 3.0, 4.0, 1.0, 1.0, 1.0, 1.0],
            quatern_x: 5.0,
            ..NiftiHeader::default()
        };
        let affine = header_affine(&header);
        assert_eq!(affine[(0, 0)], 2.0);
        assert_eq!(affine[(1, 1)], 3.0);
        assert_eq!(affine[(2, 2)], 4.0);
        assert_eq!(affine[(0, 3)], 5.0);
    }
}
