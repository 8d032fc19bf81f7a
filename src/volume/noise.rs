//! Procedural noise for the cloud density field.
//!
//! [`simplex3`] is classic 3D simplex noise over a fixed permutation table, so
//! the field is pure and reproducible across runs and platforms. The lookup
//! texture the shader samples is built by [`build_noise_table`]: a 256x256
//! grid with two channels per texel, each channel sampling the noise at a
//! different third-coordinate slice so the channels decorrelate. Cells are
//! independent, so the build is spread across threads and joined before the
//! result is handed to the GPU.

/// Texel rows and columns of the lookup table.
pub const NOISE_TABLE_SIZE: usize = 256;
/// Channels per texel.
pub const NOISE_TABLE_CHANNELS: usize = 2;
/// Grid-index to noise-coordinate divisor.
const COORD_SCALE: f32 = 64.0;

const PERM: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209,
    76, 132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198,
    173, 186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212,
    207, 206, 59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44,
    154, 163, 70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79,
    113, 224, 232, 178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12,
    191, 179, 162, 241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157,
    184, 84, 204, 176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29,
    24, 72, 243, 141, 128, 195, 78, 66, 215, 61, 156, 180,
];

#[inline]
fn hash(i: i32) -> i32 {
    i32::from(PERM[(i & 255) as usize])
}

/// Gradient dot product for one simplex corner.
fn grad(hash: i32, x: f32, y: f32, z: f32) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let u = if h & 1 != 0 { -u } else { u };
    let v = if h & 2 != 0 { -v } else { v };
    u + v
}

/// 3D simplex noise in roughly [-1, 1]. Pure and deterministic.
#[must_use]
#[allow(clippy::many_single_char_names, clippy::similar_names)]
pub fn simplex3(x: f32, y: f32, z: f32) -> f32 {
    const F3: f32 = 1.0 / 3.0;
    const G3: f32 = 1.0 / 6.0;

    // Skew into simplex cell space.
    let s = (x + y + z) * F3;
    let i = (x + s).floor() as i32;
    let j = (y + s).floor() as i32;
    let k = (z + s).floor() as i32;

    let t = (i + j + k) as f32 * G3;
    let x0 = x - (i as f32 - t);
    let y0 = y - (j as f32 - t);
    let z0 = z - (k as f32 - t);

    // Offsets of the second and third corner along the traversal order of
    // the cell, determined by the ranking of x0, y0, z0.
    let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
        if y0 >= z0 {
            (1, 0, 0, 1, 1, 0)
        } else if x0 >= z0 {
            (1, 0, 0, 1, 0, 1)
        } else {
            (0, 0, 1, 1, 0, 1)
        }
    } else if y0 < z0 {
        (0, 0, 1, 0, 1, 1)
    } else if x0 < z0 {
        (0, 1, 0, 0, 1, 1)
    } else {
        (0, 1, 0, 1, 1, 0)
    };

    let x1 = x0 - i1 as f32 + G3;
    let y1 = y0 - j1 as f32 + G3;
    let z1 = z0 - k1 as f32 + G3;
    let x2 = x0 - i2 as f32 + 2.0 * G3;
    let y2 = y0 - j2 as f32 + 2.0 * G3;
    let z2 = z0 - k2 as f32 + 2.0 * G3;
    let x3 = x0 - 1.0 + 3.0 * G3;
    let y3 = y0 - 1.0 + 3.0 * G3;
    let z3 = z0 - 1.0 + 3.0 * G3;

    let gi0 = hash(i + hash(j + hash(k)));
    let gi1 = hash(i + i1 + hash(j + j1 + hash(k + k1)));
    let gi2 = hash(i + i2 + hash(j + j2 + hash(k + k2)));
    let gi3 = hash(i + 1 + hash(j + 1 + hash(k + 1)));

    let corner = |gi: i32, cx: f32, cy: f32, cz: f32| {
        let t = 0.6 - cx * cx - cy * cy - cz * cz;
        if t < 0.0 {
            0.0
        } else {
            let t = t * t;
            t * t * grad(gi, cx, cy, cz)
        }
    };

    let n0 = corner(gi0, x0, y0, z0);
    let n1 = corner(gi1, x1, y1, z1);
    let n2 = corner(gi2, x2, y2, z2);
    let n3 = corner(gi3, x3, y3, z3);

    32.0 * (n0 + n1 + n2 + n3)
}

/// Build the two-channel lookup table, row-major, channels interleaved.
///
/// `table[(i * N + j) * 2]` holds the base field at grid cell `(i, j)` and
/// `table[(i * N + j) * 2 + 1]` a decorrelated second field over the same
/// cell. Rows are filled by worker threads over disjoint slices; the table
/// is complete when this returns.
#[must_use]
pub fn build_noise_table() -> Vec<f32> {
    let row_len = NOISE_TABLE_SIZE * NOISE_TABLE_CHANNELS;
    let mut table = vec![0.0f32; NOISE_TABLE_SIZE * row_len];

    let threads = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .clamp(1, 16);
    let rows_per_chunk = NOISE_TABLE_SIZE.div_ceil(threads);

    std::thread::scope(|scope| {
        for (chunk_index, chunk) in table.chunks_mut(rows_per_chunk * row_len).enumerate() {
            let first_row = chunk_index * rows_per_chunk;
            scope.spawn(move || fill_rows(chunk, first_row));
        }
    });
    table
}

fn fill_rows(rows: &mut [f32], first_row: usize) {
    let row_len = NOISE_TABLE_SIZE * NOISE_TABLE_CHANNELS;
    for (offset, row) in rows.chunks_mut(row_len).enumerate() {
        let i = (first_row + offset) as f32;
        for j in 0..NOISE_TABLE_SIZE {
            let jf = j as f32;
            row[j * NOISE_TABLE_CHANNELS] =
                simplex3(i / COORD_SCALE, jf / COORD_SCALE, (i + jf) / COORD_SCALE);
            row[j * NOISE_TABLE_CHANNELS + 1] =
                simplex3(i / COORD_SCALE, jf / COORD_SCALE, (jf - i) / COORD_SCALE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_is_deterministic() {
        assert_eq!(simplex3(0.3, 1.7, -2.4), simplex3(0.3, 1.7, -2.4));
        assert_eq!(simplex3(100.5, -3.25, 0.0), simplex3(100.5, -3.25, 0.0));
    }

    #[test]
    fn test_noise_stays_bounded() {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for i in 0..64 {
            for j in 0..64 {
                let v = simplex3(i as f32 / 7.3, j as f32 / 5.1, (i + j) as f32 / 11.0);
                assert!(v.is_finite());
                min = min.min(v);
                max = max.max(v);
            }
        }
        assert!(min >= -1.0 && max <= 1.0);
        // A flat field would mean the gradients are broken.
        assert!(max - min > 0.5);
    }

    #[test]
    fn test_table_shape_and_determinism() {
        let a = build_noise_table();
        assert_eq!(a.len(), NOISE_TABLE_SIZE * NOISE_TABLE_SIZE * NOISE_TABLE_CHANNELS);

        let b = build_noise_table();
        assert_eq!(a, b);
    }

    #[test]
    fn test_table_channels_decorrelate() {
        let table = build_noise_table();
        let texel = |i: usize, j: usize| {
            let base = (i * NOISE_TABLE_SIZE + j) * NOISE_TABLE_CHANNELS;
            (table[base], table[base + 1])
        };
        // On the diagonal away from the origin the two slices disagree.
        let mut differing = 0;
        for d in 1..NOISE_TABLE_SIZE {
            let (a, b) = texel(d, d);
            if (a - b).abs() > 1e-3 {
                differing += 1;
            }
        }
        assert!(differing > NOISE_TABLE_SIZE / 2);
    }

    #[test]
    fn test_table_matches_direct_evaluation() {
        let table = build_noise_table();
        for &(i, j) in &[(0usize, 0usize), (1, 0), (0, 1), (17, 200), (255, 255)] {
            let base = (i * NOISE_TABLE_SIZE + j) * NOISE_TABLE_CHANNELS;
            let fi = i as f32;
            let fj = j as f32;
            assert_eq!(table[base], simplex3(fi / 64.0, fj / 64.0, (fi + fj) / 64.0));
            assert_eq!(table[base + 1], simplex3(fi / 64.0, fj / 64.0, (fj - fi) / 64.0));
        }
    }
}
