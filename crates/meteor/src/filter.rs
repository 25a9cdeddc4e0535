//! Candidate momentum outlier removal.

/// Candidate pt above which a value is treated as a reconstruction artifact.
pub const DEFAULT_PT_THRESHOLD: f32 = 500.0;

/// Zero every entry whose absolute value exceeds `threshold`, in place.
///
/// Zeroed candidates keep their slot: they can still be selected and map to
/// `(0, 0)` in Cartesian coordinates. Returns the number of zeroed entries.
pub fn remove_pt_outliers(pt: &mut [f32], threshold: f32) -> usize {
    let mut zeroed = 0;
    for value in pt.iter_mut() {
        if value.abs() > threshold {
            *value = 0.0;
            zeroed += 1;
        }
    }
    zeroed
}
