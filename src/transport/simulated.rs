use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ArrayConfig;

use super::{Transport, TransportError};

/// Field profile recorded with the five-level array.
const FIVE_LEVEL_PROFILE: [f64; 15] = [
    29.30, 219.78, 103.05, 119.17, 118.19, 41.03, 222.22, 256.41, 147.99, 215.87, 305.74, 278.39,
    306.23, 333.09, 474.24,
];

/// Field profile recorded with the eight-electrode array.
const EIGHT_ELECTRODE_PROFILE: [f64; 13] = [
    265.20, 400.49, 451.77, 535.29, 622.71, 346.28, 545.54, 606.10, 687.67, 426.86, 631.01, 739.44,
    578.75,
];

/// Relative amplitude of the multiplicative noise.
const NOISE: f64 = 0.1;

/// Synthetic instrument: one noisy sweep every `every_ticks` polls.
///
/// With a non-zero `glitch_rate`, that fraction of sweeps is replaced by a
/// truncated line, the way a serial link drops bytes.
#[derive(Debug)]
pub struct SimulatedTransport {
    base: Vec<f64>,
    rng: StdRng,
    every_ticks: u32,
    glitch_rate: f64,
    polls: u32,
    ready: bool,
    closed: bool,
}

impl SimulatedTransport {
    pub fn new(array: ArrayConfig, seed: Option<u64>, every_ticks: u32, glitch_rate: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            base: base_profile(&array),
            rng,
            every_ticks: every_ticks.max(1),
            glitch_rate: glitch_rate.clamp(0.0, 1.0),
            polls: 0,
            ready: false,
            closed: false,
        }
    }

    fn sweep(&mut self) -> String {
        let values: Vec<String> = self
            .base
            .iter()
            .map(|v| {
                let noisy = v * self.rng.gen_range(1.0 - NOISE..1.0 + NOISE);
                format!("{noisy:.2}")
            })
            .collect();

        if self.glitch_rate > 0.0 && self.rng.gen_bool(self.glitch_rate) {
            let keep = self.rng.gen_range(0..values.len());
            return format!("[{}", values[..keep].join(", "));
        }
        format!("[{}]", values.join(", "))
    }
}

/// The recorded profile matching `array`, or a smooth synthetic one that
/// rises with depth and dips towards the centre.
fn base_profile(array: &ArrayConfig) -> Vec<f64> {
    if array.level_widths() == ArrayConfig::five_level().level_widths() {
        return FIVE_LEVEL_PROFILE.to_vec();
    }
    if array.level_widths() == ArrayConfig::eight_electrode().level_widths() {
        return EIGHT_ELECTRODE_PROFILE.to_vec();
    }
    array
        .level_widths()
        .iter()
        .enumerate()
        .flat_map(|(level, &width)| {
            (0..width).map(move |j| {
                let centre = (width as f64 - 1.0) / 2.0;
                let dip = 1.0 - 0.3 / (1.0 + (j as f64 - centre).powi(2));
                (100.0 + 60.0 * level as f64) * dip
            })
        })
        .collect()
}

impl Transport for SimulatedTransport {
    fn has_pending_input(&mut self) -> Result<bool, TransportError> {
        if self.closed {
            return Err(TransportError::disconnected("simulator closed"));
        }
        if !self.ready {
            self.polls += 1;
            if self.polls >= self.every_ticks {
                self.polls = 0;
                self.ready = true;
            }
        }
        Ok(self.ready)
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::disconnected("simulator closed"));
        }
        self.ready = false;
        Ok(self.sweep())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
