use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use tracing::debug;

use crate::models::{PatternConfig, PatternKind};

const SECONDS_PER_HOUR: f64 = 3600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

// Generated values are clamped to this, so summing a run's loads stays within u64.
pub const MAX_LOAD_PER_TICK: u64 = u32::MAX as u64;

#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    Constant,
    Random,
    SineWave,
    Spike {
        every_secs: f64,
        width_secs: f64,
        multiplier: f64,
    },
    GradualIncrease,
    GradualDecrease,
    Diurnal {
        peak_hour: u32,
        low_hour: u32,
    },
    Weekly {
        peak_hour: u32,
        low_hour: u32,
        weekend_factor: f64,
    },
    Bursty {
        probability: f64,
        multiplier: f64,
    },
}

impl Pattern {
    pub fn from_config(kind: PatternKind, config: &PatternConfig) -> Self {
        match kind {
            PatternKind::Constant => Pattern::Constant,
            PatternKind::Random => Pattern::Random,
            PatternKind::SineWave => Pattern::SineWave,
            PatternKind::Spike => Pattern::Spike {
                every_secs: config.spike_every_secs,
                width_secs: config.spike_width_secs,
                multiplier: config.spike_multiplier,
            },
            PatternKind::GradualIncrease => Pattern::GradualIncrease,
            PatternKind::GradualDecrease => Pattern::GradualDecrease,
            PatternKind::Diurnal => Pattern::Diurnal {
                peak_hour: config.peak_hour,
                low_hour: config.low_hour,
            },
            PatternKind::Weekly => Pattern::Weekly {
                peak_hour: config.peak_hour,
                low_hour: config.low_hour,
                weekend_factor: config.weekend_factor,
            },
            PatternKind::Bursty => Pattern::Bursty {
                probability: config.burst_probability,
                multiplier: config.burst_multiplier,
            },
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::Constant => PatternKind::Constant,
            Pattern::Random => PatternKind::Random,
            Pattern::SineWave => PatternKind::SineWave,
            Pattern::Spike { .. } => PatternKind::Spike,
            Pattern::GradualIncrease => PatternKind::GradualIncrease,
            Pattern::GradualDecrease => PatternKind::GradualDecrease,
            Pattern::Diurnal { .. } => PatternKind::Diurnal,
            Pattern::Weekly { .. } => PatternKind::Weekly,
            Pattern::Bursty { .. } => PatternKind::Bursty,
        }
    }
}

pub struct LoadPatternGenerator {
    pattern: Pattern,
    settings: PatternConfig,
    tick_seconds: f64,
    elapsed: f64,
    rng: StdRng,
}

impl LoadPatternGenerator {
    pub fn new(seed: u64) -> Self {
        Self::from_config(&PatternConfig::default(), 1.0, seed)
    }

    pub fn from_config(config: &PatternConfig, tick_seconds: f64, seed: u64) -> Self {
        Self {
            pattern: Pattern::from_config(config.kind, config),
            settings: config.clone(),
            tick_seconds,
            elapsed: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn kind(&self) -> PatternKind {
        self.pattern.kind()
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn base_load(&self) -> f64 {
        self.settings.base
    }

    pub fn amplitude(&self) -> f64 {
        self.settings.amplitude
    }

    pub fn frequency(&self) -> f64 {
        self.settings.frequency
    }

    pub fn tick_seconds(&self) -> f64 {
        self.tick_seconds
    }

    pub fn set_pattern(&mut self, pattern: Pattern) {
        debug!(pattern = %pattern.kind(), "load pattern changed");
        self.pattern = pattern;
        self.elapsed = 0.0;
    }

    pub fn set_kind(&mut self, kind: PatternKind) {
        self.settings.kind = kind;
        self.set_pattern(Pattern::from_config(kind, &self.settings));
    }

    pub fn set_base_load(&mut self, base: f64) {
        self.settings.base = base;
    }

    pub fn set_amplitude(&mut self, amplitude: f64) {
        self.settings.amplitude = amplitude;
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.settings.frequency = frequency;
    }

    pub fn set_tick_seconds(&mut self, tick_seconds: f64) {
        self.tick_seconds = tick_seconds;
    }

    pub fn configure_diurnal(&mut self, peak_hour: u32, low_hour: u32) {
        self.settings.peak_hour = peak_hour % 24;
        self.settings.low_hour = low_hour % 24;
        self.refresh_parameters();
    }

    pub fn configure_weekly(&mut self, weekend_factor: f64) {
        self.settings.weekend_factor = weekend_factor;
        self.refresh_parameters();
    }

    pub fn configure_bursty(&mut self, probability: f64, multiplier: f64) {
        self.settings.burst_probability = probability;
        self.settings.burst_multiplier = multiplier;
        self.refresh_parameters();
    }

    pub fn configure_spike(&mut self, every_secs: f64, width_secs: f64, multiplier: f64) {
        self.settings.spike_every_secs = every_secs;
        self.settings.spike_width_secs = width_secs;
        self.settings.spike_multiplier = multiplier;
        self.refresh_parameters();
    }

    pub fn generate_next(&mut self) -> u64 {
        let value = self.value_at(self.elapsed);
        self.elapsed += self.tick_seconds;
        value.max(0.0).min(MAX_LOAD_PER_TICK as f64).round() as u64
    }

    pub fn generate_batch(&mut self, count: usize) -> Vec<u64> {
        (0..count).map(|_| self.generate_next()).collect()
    }

    // Re-reads variant parameters into the active pattern without touching
    // elapsed time.
    fn refresh_parameters(&mut self) {
        self.pattern = Pattern::from_config(self.pattern.kind(), &self.settings);
    }

    fn value_at(&mut self, t: f64) -> f64 {
        let base = self.settings.base;
        let amplitude = self.settings.amplitude;
        let frequency = self.settings.frequency;

        match self.pattern {
            Pattern::Constant => base,
            Pattern::Random => {
                let spread = 2.0 * self.rng.gen::<f64>() - 1.0;
                base + amplitude * spread
            }
            Pattern::SineWave => base + amplitude * (2.0 * PI * frequency * t).sin(),
            Pattern::Spike {
                every_secs,
                width_secs,
                multiplier,
            } => {
                if every_secs > 0.0 && t.rem_euclid(every_secs) < width_secs {
                    base * multiplier
                } else {
                    base
                }
            }
            Pattern::GradualIncrease => base + amplitude * frequency * t,
            Pattern::GradualDecrease => base - amplitude * frequency * t,
            Pattern::Diurnal {
                peak_hour,
                low_hour,
            } => diurnal(base, amplitude, peak_hour, low_hour, t),
            Pattern::Weekly {
                peak_hour,
                low_hour,
                weekend_factor,
            } => {
                let value = diurnal(base, amplitude, peak_hour, low_hour, t);
                let day = (t / SECONDS_PER_DAY).floor() as u64 % 7;
                if day >= 5 {
                    value * weekend_factor
                } else {
                    value
                }
            }
            Pattern::Bursty {
                probability,
                multiplier,
            } => {
                if self.rng.gen::<f64>() < probability {
                    base * multiplier
                } else {
                    base
                }
            }
        }
    }
}

fn diurnal(base: f64, amplitude: f64, peak_hour: u32, low_hour: u32, t: f64) -> f64 {
    let hour = (t / SECONDS_PER_HOUR).rem_euclid(24.0);
    let peak = f64::from(peak_hour % 24);
    let low = f64::from(low_hour % 24);

    if peak == low {
        return base + amplitude * (2.0 * PI * (hour - peak) / 24.0).cos();
    }

    let rising = (peak - low).rem_euclid(24.0);
    let falling = 24.0 - rising;
    let since_low = (hour - low).rem_euclid(24.0);
    if since_low < rising {
        base - amplitude * (PI * since_low / rising).cos()
    } else {
        base + amplitude * (PI * (since_low - rising) / falling).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(kind: PatternKind) -> LoadPatternGenerator {
        let config = PatternConfig {
            kind,
            ..PatternConfig::default()
        };
        LoadPatternGenerator::from_config(&config, 1.0, 42)
    }

    #[test]
    fn constant_pattern_repeats_base_and_advances_time() {
        let mut gen = generator(PatternKind::Constant);
        assert_eq!(gen.generate_batch(3), vec![20, 20, 20]);
        assert_eq!(gen.elapsed(), 3.0);
    }

    #[test]
    fn sine_wave_follows_phase() {
        let mut gen = generator(PatternKind::SineWave);
        gen.set_frequency(0.25);
        assert_eq!(gen.generate_batch(4), vec![20, 30, 20, 10]);
    }

    #[test]
    fn sine_wave_is_never_negative() {
        for (base, amplitude) in [
            (0.0, 10.0),
            (5.0, 20.0),
            (20.0, 10.0),
            (0.5, 1_000.0),
            (1.0, 1e6),
            (0.0, 0.0),
        ] {
            let mut gen = generator(PatternKind::SineWave);
            gen.set_base_load(base);
            gen.set_amplitude(amplitude);
            gen.set_frequency(0.05);
            let values = gen.generate_batch(200);
            let crest = (base + amplitude).round() as u64;
            assert!(
                values.iter().all(|&value| value <= crest),
                "base {} amplitude {}",
                base,
                amplitude
            );
            if amplitude > base {
                assert!(values.contains(&0), "base {} amplitude {}", base, amplitude);
            }
        }
    }

    #[test]
    fn spike_fires_at_start_of_every_window() {
        let mut gen = generator(PatternKind::Spike);
        let values = gen.generate_batch(12);
        assert_eq!(values[0], 60);
        assert!(values[1..10].iter().all(|&value| value == 20));
        assert_eq!(values[10], 60);
        assert_eq!(values[11], 20);
    }

    #[test]
    fn ramps_move_linearly_and_clamp_at_zero() {
        let mut up = generator(PatternKind::GradualIncrease);
        assert_eq!(up.generate_batch(3), vec![20, 21, 22]);

        let mut down = generator(PatternKind::GradualDecrease);
        let values = down.generate_batch(40);
        assert_eq!(&values[..3], &[20, 19, 18]);
        assert_eq!(values[20], 0);
        assert_eq!(values[39], 0);
    }

    #[test]
    fn diurnal_hits_trough_and_peak_hours() {
        let mut gen = generator(PatternKind::Diurnal);
        gen.set_base_load(100.0);
        gen.set_amplitude(50.0);
        gen.set_tick_seconds(SECONDS_PER_HOUR);
        let values = gen.generate_batch(24);
        assert_eq!(values[3], 50);
        assert_eq!(values[14], 150);
        assert!(values.iter().all(|&value| (50..=150).contains(&value)));
        assert!(values[8] < values[10]);
        assert!(values[18] > values[22]);
    }

    #[test]
    fn weekly_discounts_weekends() {
        let mut gen = generator(PatternKind::Weekly);
        gen.set_base_load(100.0);
        gen.set_amplitude(50.0);
        gen.set_tick_seconds(SECONDS_PER_DAY);
        let values = gen.generate_batch(8);
        assert_eq!(values[0], values[4]);
        assert_eq!(values[5], values[6]);
        assert!(values[5] < values[0]);
        assert!((values[5] as f64 - values[0] as f64 * 0.5).abs() <= 1.0);
        assert_eq!(values[7], values[0]);
    }

    #[test]
    fn bursty_respects_probability_extremes() {
        let mut gen = generator(PatternKind::Bursty);
        gen.configure_bursty(1.0, 4.0);
        assert_eq!(gen.generate_batch(3), vec![80, 80, 80]);
        gen.configure_bursty(0.0, 4.0);
        assert_eq!(gen.generate_batch(3), vec![20, 20, 20]);
    }

    #[test]
    fn random_stays_within_amplitude_and_is_seeded() {
        let mut first = generator(PatternKind::Random);
        let mut second = generator(PatternKind::Random);
        let values = first.generate_batch(100);
        assert!(values.iter().all(|&value| (10..=30).contains(&value)));
        assert_eq!(values, second.generate_batch(100));
    }

    #[test]
    fn extreme_levels_clamp_to_the_per_tick_ceiling() {
        let mut random = generator(PatternKind::Random);
        random.set_amplitude(1e308);
        let values = random.generate_batch(50);
        assert!(values.iter().all(|&value| value <= MAX_LOAD_PER_TICK));
        assert!(values.contains(&0) || values.contains(&MAX_LOAD_PER_TICK));

        let mut bursty = generator(PatternKind::Bursty);
        bursty.configure_bursty(1.0, 1e300);
        assert_eq!(bursty.generate_next(), MAX_LOAD_PER_TICK);

        let mut ramp = generator(PatternKind::GradualIncrease);
        ramp.set_frequency(1e300);
        ramp.generate_next();
        assert_eq!(ramp.generate_next(), MAX_LOAD_PER_TICK);
    }

    #[test]
    fn switching_pattern_resets_time_but_keeps_levels() {
        let mut gen = generator(PatternKind::GradualIncrease);
        gen.set_base_load(50.0);
        gen.generate_batch(5);
        gen.set_kind(PatternKind::Constant);
        assert_eq!(gen.elapsed(), 0.0);
        assert_eq!(gen.base_load(), 50.0);
        assert_eq!(gen.generate_next(), 50);
        assert_eq!(gen.kind(), PatternKind::Constant);
    }

    #[test]
    fn configuring_active_pattern_keeps_elapsed_time() {
        let mut gen = generator(PatternKind::Diurnal);
        gen.generate_batch(2);
        gen.configure_diurnal(20, 4);
        assert_eq!(gen.elapsed(), 2.0);
        assert_eq!(
            gen.pattern(),
            &Pattern::Diurnal {
                peak_hour: 20,
                low_hour: 4
            }
        );
    }
}
