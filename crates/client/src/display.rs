use pulse_core::SnapshotItem;

pub const MIN_SIZE: u32 = 14;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedItem {
    pub text: String,
    pub count: u64,
    pub weight: f64,
    pub size: u32,
}

/// Size range for a list of `len` entries; long lists get a smaller ceiling.
pub fn size_bounds(len: usize) -> (u32, u32) {
    let max = if len > 40 {
        46
    } else if len > 25 {
        54
    } else {
        64
    };
    (MIN_SIZE, max)
}

/// Logarithmic weights relative to the largest count, mapped into
/// [`size_bounds`].
pub fn weigh(items: &[SnapshotItem]) -> Vec<WeightedItem> {
    let (min, max) = size_bounds(items.len());
    let top = items.iter().map(|item| item.count).max().unwrap_or(0);
    let denom = ((top + 1) as f64).ln();
    items
        .iter()
        .map(|item| {
            let weight = if denom > 0.0 {
                ((item.count + 1) as f64).ln() / denom
            } else {
                0.0
            };
            let size = (min as f64 + weight * (max - min) as f64).round() as u32;
            WeightedItem {
                text: item.text.clone(),
                count: item.count,
                weight,
                size,
            }
        })
        .collect()
}
