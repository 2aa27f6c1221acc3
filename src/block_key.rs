//! Quantization of world points into reconstruction blocks and the textual
//! form of block keys used as storage names.

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Offset of block boundaries from multiples of the block size. Keeps block
/// origins away from coordinates that occur all the time (0, whole meters).
pub const BLOCK_BIAS: f64 = 3.0;

/// Separator between the three coordinates of a block name.
pub const KEY_SEPARATOR: char = '_';

/// Decimals kept when writing a block origin into a name.
const NAME_DECIMALS: i32 = 4;

/// Integer cell of a cubic block, `floor((p - bias) / block_size)` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockKey {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockKey {
    pub fn new(x: i64, y: i64, z: i64) -> BlockKey {
        BlockKey { x, y, z }
    }

    /// Cell containing `p`.
    pub fn encode(p: &na::Point3<f64>, block_size: f64) -> BlockKey {
        let cell = |v: f64| ((v - BLOCK_BIAS) / block_size).floor() as i64;
        BlockKey {
            x: cell(p.x),
            y: cell(p.y),
            z: cell(p.z),
        }
    }

    /// Cell whose origin is `origin`, tolerant to the rounding of names.
    pub fn from_origin(origin: &[f64; 3], block_size: f64) -> BlockKey {
        let cell = |v: f64| ((v - BLOCK_BIAS) / block_size).round() as i64;
        BlockKey {
            x: cell(origin[0]),
            y: cell(origin[1]),
            z: cell(origin[2]),
        }
    }

    /// World coordinates of the block's minimum corner.
    pub fn origin(&self, block_size: f64) -> [f64; 3] {
        [
            self.x as f64 * block_size + BLOCK_BIAS,
            self.y as f64 * block_size + BLOCK_BIAS,
            self.z as f64 * block_size + BLOCK_BIAS,
        ]
    }

    /// Storage name `"x_y_z"` built from the block origin.
    pub fn name(&self, block_size: f64) -> String {
        let [x, y, z] = self.origin(block_size);
        format!(
            "{}{sep}{}{sep}{}",
            format_coord(x),
            format_coord(y),
            format_coord(z),
            sep = KEY_SEPARATOR
        )
    }

    /// Parses a block name back into the origin it was written from.
    pub fn decode(name: &str) -> Result<[f64; 3]> {
        let tokens: Vec<&str> = name.split(KEY_SEPARATOR).collect();
        if tokens.len() != 3 {
            return Err(Error::MalformedKey(name.to_string()));
        }
        let mut origin = [0.0; 3];
        for (v, token) in origin.iter_mut().zip(&tokens) {
            *v = token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| Error::MalformedKey(name.to_string()))?;
        }
        Ok(origin)
    }
}

/// Whole numbers print without a fraction, others with up to four decimals.
fn format_coord(v: f64) -> String {
    let scale = 10f64.powi(NAME_DECIMALS);
    let rounded = (v * scale).round() / scale;
    if rounded == 0.0 {
        return "0".to_string();
    }
    if rounded.fract() == 0.0 {
        return format!("{}", rounded as i64);
    }
    let s = format!("{:.*}", NAME_DECIMALS as usize, rounded);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_applies_bias() {
        let key = BlockKey::encode(&na::Point3::new(0.0, 3.0, 12.9), 10.0);
        assert_eq!(key, BlockKey::new(-1, 0, 0));
        assert_eq!(key.origin(10.0), [-7.0, 3.0, 3.0]);
        assert_eq!(key.name(10.0), "-7_3_3");
    }

    #[test]
    fn fractional_block_size_names() {
        let key = BlockKey::new(1, -1, 0);
        assert_eq!(key.name(5.12), "8.12_-2.12_3");
        let origin = BlockKey::decode(&key.name(5.12)).unwrap();
        assert_eq!(BlockKey::from_origin(&origin, 5.12), key);
    }

    #[test]
    fn decode_rejects_malformed() {
        for bad in ["", "1_2", "1_2_x", "1__2", "1_2_3_4", "a_b_c", "1_2_inf"] {
            assert!(
                matches!(BlockKey::decode(bad), Err(Error::MalformedKey(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert_eq!(BlockKey::decode("15_0_-3.5").unwrap(), [15.0, 0.0, -3.5]);
    }
}
