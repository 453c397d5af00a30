use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use nalgebra::DMatrix;
use nitransforms_core::spatial::{Point, Vector};
use nitransforms_core::{Affine, LinearTransformsMapping, Transform, TransformChain, TransformError};
use proptest::prelude::*;

type Backend = NdArray<f32>;

fn random_affine(params: &[f64]) -> Affine<3> {
    // Rotation times positive scales keeps the matrix well conditioned.
    let rotation = Affine::<3>::from_rotation([params[0], params[1], params[2]], None);
    let scale = Affine::from_scale(Vector::new([params[3], params[4], params[5]]));
    let shift = Affine::from_translation(Vector::new([params[6], params[7], params[8]]));
    scale.compose(&rotation).compose(&shift)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn test_affine_inverse_roundtrip(
        angles in prop::array::uniform3(-3.0f64..3.0),
        scales in prop::array::uniform3(0.2f64..5.0),
        shift in prop::array::uniform3(-50.0f64..50.0),
        point in prop::array::uniform3(-100.0f64..100.0),
    ) {
        let params: Vec<f64> = angles.iter().chain(&scales).chain(&shift).copied().collect();
        let xfm = random_affine(&params);
        let p = Point::new(point);

        let forward = xfm.map_point(&p, false).unwrap();
        let back = xfm.map_point(&forward, true).unwrap();
        prop_assert!((back - p).norm() < 1e-6);

        let inv = xfm.inverse().unwrap();
        prop_assert_eq!(xfm.compose(&inv), Affine::identity());
    }
}

#[test]
fn test_affine_from_rows() {
    let xfm = Affine::<3>::from_rows(&[
        &[1.0, 0.0, 0.0, 4.0],
        &[0.0, 1.0, 0.0, 0.0],
        &[0.0, 0.0, 1.0, 0.0],
        &[0.0, 0.0, 0.0, 1.0],
    ])
    .unwrap();
    assert_eq!(xfm.translation(), Vector::new([4.0, 0.0, 0.0]));
    assert_eq!(xfm.matrix(), DMatrix::from_row_slice(4, 4, &[
        1.0, 0.0, 0.0, 4.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]));

    let err = Affine::<3>::from_rows(&[&[1.0, 0.0], &[0.0, 1.0]]).unwrap_err();
    assert!(matches!(err, TransformError::DimensionMismatch(_)));
}

#[test]
fn test_mapping_example_values() {
    let shift = Affine::from_translation(Vector::new([1.0, 2.0, 3.0]));
    let mapping = LinearTransformsMapping::new(vec![shift.clone(), shift.inverse().unwrap()]).unwrap();
    assert_eq!(mapping.len(), 2);

    let points = [
        Point::new([0.0, 0.0, 0.0]),
        Point::new([-1.0, -1.0, -1.0]),
        Point::new([1.0, 1.0, 1.0]),
    ];
    let forward = mapping.map(&points, false).unwrap();
    assert_eq!(forward[0][2], Point::new([2.0, 3.0, 4.0]));
    assert_eq!(forward[1][1], Point::new([-2.0, -3.0, -4.0]));

    let backward = mapping.map(&points, true).unwrap();
    assert_eq!(backward[0][0], Point::new([-1.0, -2.0, -3.0]));
    assert_eq!(backward[1][0], Point::new([1.0, 2.0, 3.0]));
}

#[test]
fn test_mapping_from_matrices_validates() {
    let good = DMatrix::<f64>::identity(4, 4);
    let bad = DMatrix::<f64>::identity(3, 3);
    assert!(LinearTransformsMapping::<3>::from_matrices(&[good.clone(), good.clone()]).is_ok());
    assert!(LinearTransformsMapping::<3>::from_matrices(&[good, bad]).is_err());
    assert!(matches!(
        LinearTransformsMapping::<3>::from_matrices(&[]),
        Err(TransformError::EmptyMapping)
    ));
}

#[test]
fn test_chain_matches_composition() {
    let device = Default::default();
    let a = Affine::<3>::from_rotation([0.1, -0.2, 0.3], Some(Point::new([5.0, 5.0, 5.0])));
    let b = Affine::from_translation(Vector::new([1.0, -2.0, 0.5]));
    let composed = a.compose(&b);
    let chain = TransformChain::<Backend, 3>::default().then(a).then(b);

    let points = Tensor::<Backend, 2>::from_floats([[1.0, 2.0, 3.0], [-4.0, 0.0, 8.0]], &device);
    let via_chain = chain.transform_points(points.clone()).into_data().convert::<f32>().to_vec::<f32>().unwrap();
    let via_affine = composed.transform_points(points).into_data().convert::<f32>().to_vec::<f32>().unwrap();
    for (x, y) in via_chain.iter().zip(&via_affine) {
        assert!((x - y).abs() < 1e-4);
    }
}
