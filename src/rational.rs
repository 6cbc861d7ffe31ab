//! Exact musical time.
//!
//! All timing in the chord and combination stages is a `Ratio<i64>` of a
//! whole note. Tuplets nest arbitrarily deep, so floating point is only ever
//! used for the derived pseudo-duration handed to spacing.

use num_rational::Ratio;

/// A span or offset measured in whole notes.
pub type Time = Ratio<i64>;

/// Default exponent applied to chord durations to get pseudo-durations.
pub const DEFAULT_PACKEXP: f64 = 0.8;

pub fn zero() -> Time {
    Time::from_integer(0)
}

pub fn to_f64(t: Time) -> f64 {
    *t.numer() as f64 / *t.denom() as f64
}

/// Duration raised to the packing exponent, used by horizontal spacing.
pub fn pseudo_duration(duration: Time, packexp: f64) -> f64 {
    to_f64(duration).powf(packexp)
}

/// Length of a note value: `basic_time` 4 is a quarter, 0 a double whole,
/// each dot adds half of the previous addition.
pub fn note_value(basic_time: u16, dots: u8) -> Time {
    let base = if basic_time == 0 {
        Time::from_integer(2)
    } else {
        Time::new(1, basic_time as i64)
    };
    // (2 - 1/2^dots)
    let pow = 1i64 << dots;
    base * Time::new(2 * pow - 1, pow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_values() {
        assert_eq!(note_value(4, 0), Time::new(1, 4));
        assert_eq!(note_value(4, 1), Time::new(3, 8));
        assert_eq!(note_value(4, 2), Time::new(7, 16));
        assert_eq!(note_value(0, 0), Time::from_integer(2));
    }

    #[test]
    fn test_pseudo_duration_of_whole_is_one() {
        assert_eq!(pseudo_duration(Time::from_integer(1), DEFAULT_PACKEXP), 1.0);
        let half = pseudo_duration(Time::new(1, 2), DEFAULT_PACKEXP);
        assert!(half > 0.5 && half < 1.0);
    }
}
