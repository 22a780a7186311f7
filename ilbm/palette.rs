use std::ops::{Index, IndexMut};

/// Rate values in CRNG/CCRT chunks are in units of this many steps per
/// second, i.e. a rate of 280 cycles one palette position per second.
pub const CYCLE_RATE_DIVISOR: u32 = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// Expands a packed 12-bit Amiga color (4 bits per channel) to 8-bit by
    /// bit replication.
    pub fn from_rgb4(r: u8, g: u8, b: u8) -> Self {
        Color {
            r: (r & 0xF) * 17,
            g: (g & 0xF) * 17,
            b: (b & 0xF) * 17,
        }
    }

    /// Linear interpolation towards `other`, per channel, rounded to nearest.
    pub fn blend(&self, other: &Color, value: f64) -> Color {
        let inv = 1.0 - value;
        Color {
            r: (f64::from(self.r) * inv + f64::from(other.r) * value).round() as u8,
            g: (f64::from(self.g) * inv + f64::from(other.g) * value).round() as u8,
            b: (f64::from(self.b) * inv + f64::from(other.b) * value).round() as u8,
        }
    }
}

/// A color cycling range, normalized from either a CRNG or a CCRT chunk.
/// `low` and `high` are inclusive palette indices with `low < high`; `rate`
/// is in [`CYCLE_RATE_DIVISOR`] units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub low: u8,
    pub high: u8,
    pub rate: u32,
    pub reverse: bool,
}

impl Cycle {
    pub fn new(low: u8, high: u8, rate: u32, reverse: bool) -> Self {
        Cycle { low, high, rate, reverse }
    }
}

/// A full 256-entry color table. Index 0 is an ordinary color, not reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    data: [Color; 256],
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            data: [Color::default(); 256],
        }
    }
}

impl Index<usize> for Palette {
    type Output = Color;

    fn index(&self, index: usize) -> &Color {
        &self.data[index]
    }
}

impl IndexMut<usize> for Palette {
    fn index_mut(&mut self, index: usize) -> &mut Color {
        &mut self.data[index]
    }
}

impl Palette {
    pub fn colors(&self) -> &[Color; 256] {
        &self.data
    }

    pub fn rotate_left(&mut self, low: u8, high: u8, distance: u32) {
        self.data[low as usize..=high as usize].rotate_left(distance as usize);
    }

    pub fn rotate_right(&mut self, low: u8, high: u8, distance: u32) {
        self.data[low as usize..=high as usize].rotate_right(distance as usize);
    }

    pub fn apply_cycle(&mut self, cycle: &Cycle, now: f64) {
        if cycle.high > cycle.low && cycle.rate > 0 {
            let size = f64::from(cycle.high - cycle.low) + 1.0;
            let rate = f64::from(cycle.rate) / f64::from(CYCLE_RATE_DIVISOR);
            let distance = (rate * now).rem_euclid(size) as u32;
            if cycle.reverse {
                self.rotate_left(cycle.low, cycle.high, distance);
            } else {
                self.rotate_right(cycle.low, cycle.high, distance);
            }
        }
    }

    /// Like [`Palette::apply_cycle`], but also cross-fades by the fractional
    /// part of the rotation distance, reading source colors from `base`.
    pub fn apply_cycle_blended(&mut self, base: &Palette, cycle: &Cycle, now: f64) {
        if cycle.high <= cycle.low || cycle.rate == 0 {
            return;
        }

        let low = cycle.low as usize;
        let size = (cycle.high - cycle.low) as usize + 1;
        let rate = f64::from(cycle.rate) / f64::from(CYCLE_RATE_DIVISOR);
        let fdistance = (rate * now).rem_euclid(size as f64);
        let distance = fdistance as usize;
        let mid = fdistance - distance as f64;

        let src = &base.data[low..low + size];
        let dest = &mut self.data[low..low + size];

        if cycle.reverse {
            for dest_index in 0..size {
                let src_index1 = (dest_index + distance) % size;
                let src_index2 = (dest_index + distance + 1) % size;
                dest[dest_index] = src[src_index1].blend(&src[src_index2], mid);
            }
        } else {
            // dest lands one past the whole-step rotation so that mid = 0
            // reproduces rotate_right(distance) exactly
            let inv = 1.0 - mid;
            for src_index1 in 0..size {
                let dest_index = (src_index1 + distance + 1) % size;
                let src_index2 = (src_index1 + 1) % size;
                dest[dest_index] = src[src_index1].blend(&src[src_index2], inv);
            }
        }
    }

    pub fn apply_cycles(&mut self, cycles: &[Cycle], now: f64) {
        for cycle in cycles {
            self.apply_cycle(cycle, now);
        }
    }

    /// Resets this palette to `base` and applies every cycle in source order.
    /// Pure over (base, cycles, now); `self` is only scratch space.
    pub fn apply_cycles_from(&mut self, base: &Palette, cycles: &[Cycle], now: f64, blend: bool) {
        self.data = base.data;

        if blend {
            for cycle in cycles {
                self.apply_cycle_blended(base, cycle, now);
            }
        } else {
            self.apply_cycles(cycles, now);
        }
    }
}
