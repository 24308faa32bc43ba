pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Mean where element `i` is weighted by `base^i`, so later (more recent)
/// entries count more when `base > 1`.
pub fn weighted_mean(data: &[f64], base: f64) -> Option<f64> {
    if data.is_empty() {
        return None;
    }

    let (weighted_sum, weight_total) = data
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, total), (i, value)| {
            let weight = base.powi(i as i32);
            (sum + value * weight, total + weight)
        });

    Some(weighted_sum / weight_total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
        assert_eq!(mean(&[15., 7., 55., 12., 4.]), Some(18.6));
    }

    #[test]
    fn test_mean_single_value() {
        assert_eq!(mean(&[42.0]), Some(42.0));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_weighted_mean_unit_base_is_plain_mean() {
        assert_eq!(weighted_mean(&[10.0, 20.0, 30.0], 1.0), Some(20.0));
    }

    #[test]
    fn test_weighted_mean_favours_recent_values() {
        let weighted = weighted_mean(&[50.0, 50.0, 100.0], 1.2).unwrap();
        let plain = mean(&[50.0, 50.0, 100.0]).unwrap();
        assert!(weighted > plain);

        // weights 1, 1.2, 1.44 => (50 + 60 + 144) / 3.64
        assert!((weighted - 254.0 / 3.64).abs() < 1e-10);
    }

    #[test]
    fn test_weighted_mean_empty_slice() {
        assert_eq!(weighted_mean(&[], 1.2), None);
    }
}
