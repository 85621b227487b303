use util::RingBuffer;

use crate::FILTER_TAPS;

/*

Symmetric 41-tap low-pass FIR kernel for a 40 Hz sample rate (25 ms tick).

Only one half is stored: FILTER_VALS[i] weighs taps i and 40 - i, the last
entry is the center tap. The full kernel sums to 1, so a constant input passes
unchanged and is removed again by the window mean.

*/

pub const FILTER_HALF: usize = FILTER_TAPS / 2 + 1;
const FILTER_CENTER: usize = FILTER_HALF - 1;
const FILTER_VALS: [f64; FILTER_HALF] = [
    0.0,
    0.00678190440717335,
    0.0128304886003170,
    0.0166758096650767,
    0.0171482412850874,
    0.0136648483471950,
    0.00642694715522822,
    -0.00351836771450904,
    -0.0143765462449265,
    -0.0238580166855590,
    -0.0295488021894095,
    -0.0293384634673633,
    -0.0218299499731156,
    -0.00665502893774734,
    0.0153675652743912,
    0.0422682866768967,
    0.0711605486728263,
    0.0986399430404164,
    0.121286108430723,
    0.136184500458578,
    0.141379966397442,
];

/// Scale applied to the DC-free output before rounding to an integer.
const OUTPUT_SCALE: f64 = 100.0;

#[derive(Clone, PartialEq, Debug)]
pub struct SampleFilter {
    history: RingBuffer<FILTER_TAPS, i32>,
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleFilter {
    pub fn new() -> Self {
        Self {
            history: Default::default(),
        }
    }

    /// Appends `val` to the history and returns the band-limited, DC-free
    /// sample scaled by 100.
    ///
    /// The first 40 outputs after construction are computed against a
    /// partially zero history and carry no useful signal.
    pub fn push(&mut self, val: i32) -> i32 {
        self.history.add(val);

        let tap = |i: usize| *self.history.chronological(i) as f64;

        let mut filtered = FILTER_VALS[FILTER_CENTER] * tap(FILTER_CENTER);
        let mut sum = tap(FILTER_CENTER);
        for (i, coeff) in FILTER_VALS[..FILTER_CENTER].iter().enumerate() {
            let pair = tap(i) + tap(FILTER_TAPS - 1 - i);
            filtered += coeff * pair;
            sum += pair;
        }
        let mean = sum / FILTER_TAPS as f64;

        libm::round((filtered - mean) * OUTPUT_SCALE) as i32
    }

    /// Raw samples currently in the window, oldest first.
    pub fn history(&self) -> impl Iterator<Item = i32> + '_ {
        self.history.oldest_first().copied()
    }
}
