//! # Expo Curves
//!
//! Fixed-point stick expo. Small deflections get a reduced gain while full
//! deflection keeps unity gain, which softens the response around center.
//!
//! The gain for a deflection is looked up from a table indexed by
//! `|value| >> EXPO_SHIFT`. Table entries are gain × 128, so the product is
//! rescaled with `>> 7`.
//!
//! Row `level` of the table is
//! `gain[i] = 128 - level * 96 * (16 - i)² / (100 * 256)`, which is 128 for
//! level 0 everywhere and bottoms out at 32 at center for level 100.
//!
//! ## Usage
//!
//! ```
//! use openaero_io::rc::expo::get_expo;
//!
//! assert_eq!(get_expo(250, 0), 250);  // level 0 is linear
//! assert!(get_expo(100, 60) < 100);   // softened near center
//! assert_eq!(get_expo(-600, 60), -600); // full deflection unchanged
//! ```

/// Number of gain points per expo level.
pub const EXPO_POINTS: usize = 17;

/// Right shift from deflection magnitude to table index.
pub const EXPO_SHIFT: u32 = 5;

/// Highest expo level.
pub const MAX_EXPO_LEVEL: u8 = 100;

/// Gain × 128 per level and index.
pub static EXPO_GAIN: [[u8; EXPO_POINTS]; MAX_EXPO_LEVEL as usize + 1] = generate_expo_table();

/// Generate the expo gain table at compile time
const fn generate_expo_table() -> [[u8; EXPO_POINTS]; MAX_EXPO_LEVEL as usize + 1] {
    let mut table = [[0u8; EXPO_POINTS]; MAX_EXPO_LEVEL as usize + 1];
    let mut level = 0;

    while level <= MAX_EXPO_LEVEL as usize {
        let mut i = 0;

        while i < EXPO_POINTS {
            let span = (EXPO_POINTS - 1 - i) as u32;
            let cut = (level as u32 * 96 * span * span) / (100 * 256);
            table[level][i] = (128 - cut) as u8;
            i += 1;
        }

        level += 1;
    }

    table
}

/// Applies expo `level` (0-100, higher values clamp) to a signed deflection.
///
/// Odd-symmetric: the curve is computed on the magnitude and the sign is
/// restored, so `get_expo(-x) == -get_expo(x)`.
#[inline]
#[must_use]
pub fn get_expo(value: i32, level: u8) -> i32 {
    if level == 0 || value == 0 {
        return value;
    }

    let row = &EXPO_GAIN[level.min(MAX_EXPO_LEVEL) as usize];
    let magnitude = value.unsigned_abs();
    let index = ((magnitude >> EXPO_SHIFT) as usize).min(EXPO_POINTS - 1);
    let shaped = ((u64::from(magnitude) * u64::from(row[index])) >> 7) as i32;

    if value < 0 {
        -shaped
    } else {
        shaped
    }
}
