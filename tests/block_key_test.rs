use nalgebra as na;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rgbd_block_fusion::block_key::{BlockKey, BLOCK_BIAS};
use rgbd_block_fusion::Error;

const BLOCK_SIZES: [f64; 5] = [0.5, 1.0, 2.56, 5.12, 10.0];

#[test]
fn test_name_round_trips_through_decode() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..5000 {
        let bs = BLOCK_SIZES[rng.random_range(0..BLOCK_SIZES.len())];
        let p = na::Point3::new(
            rng.random_range(-100.0..100.0),
            rng.random_range(-100.0..100.0),
            rng.random_range(-100.0..100.0),
        );
        let key = BlockKey::encode(&p, bs);
        let origin = BlockKey::decode(&key.name(bs)).unwrap();
        assert_eq!(
            BlockKey::from_origin(&origin, bs),
            key,
            "{} with block size {}",
            key.name(bs),
            bs
        );
    }
}

#[test]
fn test_encoded_block_contains_point() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for _ in 0..5000 {
        let bs = BLOCK_SIZES[rng.random_range(0..BLOCK_SIZES.len())];
        let p = na::Point3::new(
            rng.random_range(-50.0..50.0),
            rng.random_range(-50.0..50.0),
            rng.random_range(-50.0..50.0),
        );
        let origin = BlockKey::encode(&p, bs).origin(bs);
        for axis in 0..3 {
            assert!(origin[axis] <= p[axis] + 1e-9, "{:?} below {:?}", p, origin);
            assert!(p[axis] < origin[axis] + bs + 1e-9, "{:?} past {:?}", p, origin);
        }
    }
}

#[test]
fn test_biased_grid_origins() {
    // the grid is shifted so that the plane through the bias lies on a block border
    let key = BlockKey::encode(&na::Point3::new(BLOCK_BIAS, BLOCK_BIAS, BLOCK_BIAS), 10.0);
    assert_eq!(key, BlockKey::new(0, 0, 0));
    assert_eq!(key.name(10.0), "3_3_3");

    let key = BlockKey::encode(&na::Point3::new(2.999, 3.0, 13.0), 10.0);
    assert_eq!(key.name(10.0), "-7_3_13");
}

#[test]
fn test_distinct_points_in_one_cell_share_a_key() {
    let a = BlockKey::encode(&na::Point3::new(3.1, 3.2, 3.3), 2.0);
    let b = BlockKey::encode(&na::Point3::new(4.9, 4.9, 4.9), 2.0);
    assert_eq!(a, b);
    let c = BlockKey::encode(&na::Point3::new(5.0, 4.9, 4.9), 2.0);
    assert_ne!(a, c);
}

#[test]
fn test_decode_is_strict() {
    for bad in ["3_3", "3_3_3_", "_3_3_3", "3;3;3", "3_3_nan", "x_y_z", "3 _3_3"] {
        assert!(
            matches!(BlockKey::decode(bad), Err(Error::MalformedKey(_))),
            "{:?} should not decode",
            bad
        );
    }
    assert_eq!(BlockKey::decode("-7_3_3").unwrap(), [-7.0, 3.0, 3.0]);
    assert_eq!(BlockKey::decode("8.12_-2.12_3").unwrap(), [8.12, -2.12, 3.0]);
}
