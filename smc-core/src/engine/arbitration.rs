//! Max-of-enabled arbitration

/// Reduce loop outputs to one fan command
///
/// Returns the largest output among enabled slots, or `floor` when no slot
/// is enabled. Slots past the end of `enabled` count as disabled. No
/// clamping happens here; each loop's output clamp bounds its slot.
pub fn arbitrate(outputs: &[f32], enabled: &[bool], floor: f32) -> f32 {
    outputs
        .iter()
        .zip(enabled)
        .filter(|(_, &on)| on)
        .map(|(&value, _)| value)
        .fold(None, |acc: Option<f32>, value| {
            Some(match acc {
                Some(best) if best >= value => best,
                _ => value,
            })
        })
        .unwrap_or(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::output;

    #[test]
    fn test_max_of_enabled() {
        assert_eq!(arbitrate(&[30.0, 55.0, 70.0], &[true, true, false], output::FLOOR), 55.0);
    }

    #[test]
    fn test_none_enabled_gives_floor() {
        let cmd = arbitrate(&[30.0, 55.0], &[false, false], output::FLOOR);
        assert!((cmd - 19.99).abs() < 1e-4);
        assert!(cmd < output::LOOP_MIN);
    }

    #[test]
    fn test_empty_table_gives_floor() {
        assert_eq!(arbitrate(&[], &[], 12.5), 12.5);
    }

    #[test]
    fn test_no_clamping() {
        // Values outside the usual loop range pass through untouched
        assert_eq!(arbitrate(&[5.0, 150.0], &[true, true], output::FLOOR), 150.0);
        assert_eq!(arbitrate(&[5.0], &[true], output::FLOOR), 5.0);
    }

    #[test]
    fn test_short_mask_treats_rest_as_disabled() {
        assert_eq!(arbitrate(&[40.0, 80.0], &[true], output::FLOOR), 40.0);
    }
}
