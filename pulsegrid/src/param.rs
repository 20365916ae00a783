//! Bounded control values with a random deviation budget.

use rand::Rng;
use std::fmt;

/// Numeric types a [`Param`] can hold.
pub trait Bounded: Copy + PartialOrd + fmt::Debug {
    fn to_i64(self) -> i64;
    /// Converts back, assuming `value` already lies inside the target range.
    fn from_i64(value: i64) -> Self;
}

macro_rules! impl_bounded {
    ($($ty:ty),*) => {
        $(
            impl Bounded for $ty {
                fn to_i64(self) -> i64 {
                    self as i64
                }
                fn from_i64(value: i64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_bounded!(u8, u16, i16, i32);

/// Draws a signed offset of magnitude `0..=|jitter|` in the sign of `jitter`.
pub(crate) fn jitter_offset(jitter: i32) -> i64 {
    if jitter == 0 {
        return 0;
    }
    let magnitude = rand::rng().random_range(0..=jitter.unsigned_abs()) as i64;
    if jitter < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// A value clamped to `[min, max]`, optionally randomized around its base
/// every time it is computed.
///
/// `last` always holds the most recently computed value, so a note-off can
/// replay exactly what the note-on used.
#[derive(Debug, Clone)]
pub struct Param<T> {
    base: T,
    min: T,
    max: T,
    jitter: i32,
    last: T,
}

/// Two parameters are equal when they are configured alike; the last drawn
/// value is not compared.
impl<T: PartialEq> PartialEq for Param<T> {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
            && self.min == other.min
            && self.max == other.max
            && self.jitter == other.jitter
    }
}

impl<T: Bounded> Param<T> {
    pub fn new(base: T, min: T, max: T) -> Self {
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        let base = Self::clamp_into(base, min, max);
        Self {
            base,
            min,
            max,
            jitter: 0,
            last: base,
        }
    }

    pub fn with_jitter(mut self, jitter: i32) -> Self {
        self.set_random_amount(jitter);
        self
    }

    fn clamp_into(value: T, min: T, max: T) -> T {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    pub fn value(&self) -> T {
        self.base
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    pub fn random_amount(&self) -> i32 {
        self.jitter
    }

    /// Sets the base value. Values outside `[min, max]` are ignored.
    pub fn set(&mut self, value: T) {
        if value < self.min || value > self.max {
            return;
        }
        self.base = value;
    }

    /// Sets the jitter budget. A budget wider than the range is ignored.
    pub fn set_random_amount(&mut self, jitter: i32) {
        let span = self.max.to_i64() - self.min.to_i64();
        if i64::from(jitter).abs() > span {
            return;
        }
        self.jitter = jitter;
    }

    /// Draws a fresh value and remembers it.
    pub fn computed(&mut self) -> T {
        let raw = self.base.to_i64() + jitter_offset(self.jitter);
        self.commit(raw)
    }

    /// The value drawn by the previous [`Param::computed`] call.
    pub fn last(&self) -> T {
        self.last
    }

    /// Clamps `raw` into range and records it as the last computed value.
    pub(crate) fn commit(&mut self, raw: i64) -> T {
        let clamped = raw.max(self.min.to_i64()).min(self.max.to_i64());
        self.last = T::from_i64(clamped);
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computed_stays_in_range_for_any_jitter() {
        for base in [0u8, 3, 60, 120, 127] {
            for jitter in [-127, -40, -1, 0, 1, 9, 127] {
                let mut param = Param::new(base, 0u8, 127).with_jitter(jitter);
                for _ in 0..200 {
                    let value = param.computed();
                    assert!(value <= 127);
                    assert_eq!(param.last(), value);
                }
            }
        }

        let mut narrow = Param::new(5i32, 2, 8).with_jitter(-6);
        for _ in 0..200 {
            let value = narrow.computed();
            assert!((2..=8).contains(&value), "{}", value);
        }
    }

    #[test]
    fn jitter_follows_its_sign() {
        let mut up = Param::new(10u8, 0, 127).with_jitter(5);
        let mut down = Param::new(10u8, 0, 127).with_jitter(-5);
        for _ in 0..200 {
            assert!((10..=15).contains(&up.computed()));
            assert!((5..=10).contains(&down.computed()));
        }
    }

    #[test]
    fn set_outside_range_is_ignored() {
        let mut param = Param::new(4u8, 1, 16);
        param.set(0);
        assert_eq!(param.value(), 4);
        param.set(17);
        assert_eq!(param.value(), 4);
        param.set(16);
        assert_eq!(param.value(), 16);
    }

    #[test]
    fn oversized_jitter_is_ignored() {
        let mut param = Param::new(4u8, 1, 16).with_jitter(3);
        param.set_random_amount(16);
        assert_eq!(param.random_amount(), 3);
        param.set_random_amount(-15);
        assert_eq!(param.random_amount(), -15);
    }

    #[test]
    fn last_replays_without_redrawing() {
        let mut param = Param::new(64u8, 0, 127).with_jitter(20);
        let drawn = param.computed();
        for _ in 0..10 {
            assert_eq!(param.last(), drawn);
        }
    }

    #[test]
    fn construction_clamps_base_and_orders_bounds() {
        let param = Param::new(200u8, 127, 0);
        assert_eq!(param.min(), 0);
        assert_eq!(param.max(), 127);
        assert_eq!(param.value(), 127);
        assert_eq!(param.last(), 127);
    }
}
