//! Main tone engine: voice graph lifecycle over a cpal output stream
//!
//! `TonePlayer` owns everything: the lazily-opened output stream, the shared
//! render state, the coarse timer thread, and the stored tone parameters.
//! Public operations return immediately after mutating shared state and
//! scheduling future amplitude changes; the audio callback does the
//! sample-accurate work.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::device::{self, AudioConfig};
use super::error::AudioInitError;
use super::noise;
use super::param::Param;
use super::scheduler::{Scheduler, SchedulerHandle, TaskHandle};
use super::voice::{NoiseVoice, OscVoice, Pan, VoiceBank, VoiceGroup};

/// Default fade length for onset, stop, and volume ramps, in seconds.
pub const FADE_DURATION: f32 = 0.1;

/// Carrier frequency for isochronic and implicit-binaural tones.
pub const BASE_CARRIER_HZ: f32 = 400.0;

/// Below this frequency a bare tone is a beat rate, carried on a stereo pair.
const BINAURAL_LIMIT_HZ: f32 = 40.0;

/// Silent gap between fade-out and fade-in during a transition, in seconds.
const TRANSITION_GAP: f32 = 0.05;

/// Edge fade on each isochronic pulse, in seconds.
const ISO_EDGE_FADE: f64 = 0.005;

/// Fixed amplitude target for the pink-noise bed.
const NOISE_GAIN: f32 = 0.08;

/// Perfect fifth: 3:2 above the active carrier(s), at half amplitude.
const FIFTH_RATIO: f32 = 1.5;
const FIFTH_GAIN: f32 = 0.5;

/// Voices are released this factor past their fade-out length, so the ramp
/// is guaranteed to have completed.
const CLEANUP_GRACE: f64 = 1.1;

const DEFAULT_VOLUME: f32 = 0.5;

/// Helper to store f32 in AtomicU32
#[inline]
fn f32_to_u32(f: f32) -> u32 {
    f.to_bits()
}

/// Helper to load f32 from AtomicU32
#[inline]
fn u32_to_f32(u: u32) -> f32 {
    f32::from_bits(u)
}

/// Parameters for `play` and `transition_to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ToneRequest {
    /// Tone frequency in Hz: the beat rate for entrainment tones, the pitch
    /// for plain tones.
    pub frequency: f32,
    /// Add the perfect-fifth overlay from the start.
    pub play_perfect_fifth: bool,
    /// Explicit binaural carriers; both must be set to take effect.
    pub carrier_left: Option<f32>,
    pub carrier_right: Option<f32>,
    /// Add the looping pink-noise bed.
    pub include_pink_noise: bool,
    /// Amplitude-gate a single carrier at `frequency` pulses per second.
    pub is_isochronic: bool,
    /// Defer graph construction by this long (used by transitions).
    pub fade_in_delay_ms: u64,
    /// Onset ramp length in seconds.
    pub fade_in_duration: f32,
}

impl ToneRequest {
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency,
            ..Self::default()
        }
    }
}

impl Default for ToneRequest {
    fn default() -> Self {
        Self {
            frequency: 0.0,
            play_perfect_fifth: false,
            carrier_left: None,
            carrier_right: None,
            include_pink_noise: false,
            is_isochronic: false,
            fade_in_delay_ms: 0,
            fade_in_duration: FADE_DURATION,
        }
    }
}

/// The stored parameters of the currently active tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ToneConfig {
    pub frequency: f32,
    pub carrier_left: Option<f32>,
    pub carrier_right: Option<f32>,
    pub play_perfect_fifth: bool,
    pub is_isochronic: bool,
}

impl From<&ToneRequest> for ToneConfig {
    fn from(request: &ToneRequest) -> Self {
        Self {
            frequency: request.frequency,
            carrier_left: request.carrier_left,
            carrier_right: request.carrier_right,
            play_perfect_fifth: request.play_perfect_fifth,
            is_isochronic: request.is_isochronic,
        }
    }
}

/// How a tone config maps onto generators. Computed once and used by both
/// the main builder and the fifth-overlay builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneTopology {
    /// Single carrier at [`BASE_CARRIER_HZ`], amplitude-gated at the beat
    /// rate.
    Isochronic { beat_hz: f32 },
    /// Stereo pair from caller-provided carriers, hard-panned L/R.
    ExplicitBinaural { left_hz: f32, right_hz: f32 },
    /// Stereo pair derived from a beat rate below [`BINAURAL_LIMIT_HZ`].
    ImplicitBinaural { left_hz: f32, right_hz: f32 },
    /// One unpanned tone at the requested frequency.
    Mono { hz: f32 },
}

impl ToneTopology {
    /// Classify the main tone. Decision order matters: isochronic wins over
    /// explicit carriers, which win over the beat-rate threshold.
    pub fn classify(config: &ToneConfig) -> Self {
        if config.is_isochronic {
            ToneTopology::Isochronic {
                beat_hz: config.frequency,
            }
        } else if let (Some(left), Some(right)) = (config.carrier_left, config.carrier_right) {
            ToneTopology::ExplicitBinaural {
                left_hz: left,
                right_hz: right,
            }
        } else if config.frequency < BINAURAL_LIMIT_HZ {
            ToneTopology::ImplicitBinaural {
                left_hz: BASE_CARRIER_HZ,
                right_hz: BASE_CARRIER_HZ + config.frequency,
            }
        } else {
            ToneTopology::Mono {
                hz: config.frequency,
            }
        }
    }

    /// Classify the perfect-fifth overlay: the same branching, minus the
    /// isochronic case, with every carrier raised a fifth.
    pub fn classify_fifth(config: &ToneConfig) -> Self {
        if let (Some(left), Some(right)) = (config.carrier_left, config.carrier_right) {
            ToneTopology::ExplicitBinaural {
                left_hz: left * FIFTH_RATIO,
                right_hz: right * FIFTH_RATIO,
            }
        } else if config.frequency < BINAURAL_LIMIT_HZ {
            ToneTopology::ImplicitBinaural {
                left_hz: BASE_CARRIER_HZ * FIFTH_RATIO,
                right_hz: (BASE_CARRIER_HZ + config.frequency) * FIFTH_RATIO,
            }
        } else {
            ToneTopology::Mono {
                hz: config.frequency * FIFTH_RATIO,
            }
        }
    }
}

/// Cancellable timer handles owned by the engine.
#[derive(Default)]
struct EngineTimers {
    isochronic: Option<TaskHandle>,
    pending_play: Option<TaskHandle>,
}

/// State shared between the control side, the timer thread, and the audio
/// callback.
struct EngineShared {
    sample_rate: u32,
    /// Device clock: frames rendered so far.
    clock_frames: AtomicU64,
    playing: AtomicBool,
    /// Normalized volume scalar as f32 bits, lock-free.
    volume_bits: AtomicU32,
    bank: Mutex<VoiceBank>,
    current: Mutex<Option<ToneConfig>>,
    timers: Mutex<EngineTimers>,
}

impl EngineShared {
    /// Device-clock "now" in seconds.
    fn now(&self) -> f64 {
        self.clock_frames.load(Ordering::Relaxed) as f64 / f64::from(self.sample_rate)
    }

    fn volume(&self) -> f32 {
        u32_to_f32(self.volume_bits.load(Ordering::Relaxed))
    }

    fn set_volume_scalar(&self, volume: f32) {
        self.volume_bits.store(f32_to_u32(volume), Ordering::Relaxed);
    }

    fn cancel_timers(&self) {
        let mut timers = self.timers.lock();
        if let Some(task) = timers.isochronic.take() {
            task.cancel();
        }
        if let Some(task) = timers.pending_play.take() {
            task.cancel();
        }
    }
}

/// The opened output stream plus its shared render state.
struct EngineContext {
    _stream: cpal::Stream,
    shared: Arc<EngineShared>,
}

impl EngineContext {
    fn open(
        device_name: Option<&str>,
        preferred: &AudioConfig,
        volume: f32,
    ) -> Result<Self, AudioInitError> {
        let device = device::get_output_device(device_name)?;
        let stream_config = device::get_supported_config(&device, preferred)?;

        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        log::info!(
            "starting audio engine: {} Hz, {} channels",
            sample_rate,
            channels
        );

        let shared = Arc::new(EngineShared {
            sample_rate,
            clock_frames: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            volume_bits: AtomicU32::new(f32_to_u32(volume)),
            bank: Mutex::new(VoiceBank::new(sample_rate, volume)),
            current: Mutex::new(None),
            timers: Mutex::new(EngineTimers::default()),
        });

        let shared_clone = Arc::clone(&shared);
        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let start = shared_clone.clock_frames.load(Ordering::Relaxed);
                shared_clone.bank.lock().render(data, channels, start);
                let frames = (data.len() / channels.max(1)) as u64;
                shared_clone
                    .clock_frames
                    .store(start + frames, Ordering::Relaxed);
            },
            move |err| {
                log::error!("audio stream error: {}", err);
            },
            None,
        )?;

        stream.play()?;

        Ok(Self {
            _stream: stream,
            shared,
        })
    }
}

/// The tone engine.
///
/// Owns the output stream (opened lazily by the first `play`), the current
/// tone state, and every scheduled task. Dropping the player cancels all
/// timers and releases the stream.
pub struct TonePlayer {
    // Declared before `context`: the timer thread is joined before the
    // stream is released.
    scheduler: Scheduler,
    context: Option<EngineContext>,
    device_name: Option<String>,
    config: AudioConfig,
    volume: f32,
}

impl TonePlayer {
    pub fn new() -> Self {
        Self::with_output(None, AudioConfig::default())
    }

    /// Use a named output device and preferred stream config instead of the
    /// defaults. The device is not opened until the first `play`.
    pub fn with_output(device_name: Option<String>, config: AudioConfig) -> Self {
        Self {
            scheduler: Scheduler::new(),
            context: None,
            device_name,
            config,
            volume: DEFAULT_VOLUME,
        }
    }

    /// Build the tone graphs described by `request` and start playback.
    ///
    /// Opens the audio context on first use; that is the only fallible step.
    /// With a nonzero `fade_in_delay_ms` the graph construction itself is
    /// deferred (and cancelled by an intervening `stop`).
    pub fn play(&mut self, request: ToneRequest) -> Result<(), AudioInitError> {
        let shared = self.ensure_shared()?;

        log::info!(
            "play: {:.2} Hz (isochronic: {}, fifth: {}, noise: {}, delay: {} ms)",
            request.frequency,
            request.is_isochronic,
            request.play_perfect_fifth,
            request.include_pink_noise,
            request.fade_in_delay_ms
        );

        *shared.current.lock() = Some(ToneConfig::from(&request));
        shared.playing.store(true, Ordering::SeqCst);

        let scheduler = self.scheduler.handle();
        if request.fade_in_delay_ms == 0 {
            build_graphs(&shared, &scheduler, &request);
        } else {
            let weak = Arc::downgrade(&shared);
            let chained = scheduler.clone();
            let delay = Duration::from_millis(request.fade_in_delay_ms);
            let handle = scheduler.schedule_once(delay, move || {
                let Some(shared) = weak.upgrade() else { return };
                if !shared.playing.load(Ordering::SeqCst) {
                    return;
                }
                build_graphs(&shared, &chained, &request);
            });
            let mut timers = shared.timers.lock();
            if let Some(old) = timers.pending_play.replace(handle) {
                old.cancel();
            }
        }

        Ok(())
    }

    /// Fade out and release everything, with the default 100 ms fade.
    pub fn stop(&mut self) {
        self.stop_with_fade(FADE_DURATION);
    }

    /// Fade out over `fade_secs` and release every active voice. Safe to
    /// call when already idle.
    pub fn stop_with_fade(&mut self, fade_secs: f32) {
        let Some(ctx) = &self.context else { return };
        stop_graphs(&ctx.shared, &self.scheduler.handle(), fade_secs);
    }

    /// Ramp the master stage to `volume` (clamped to [0, 1]) over 100 ms.
    /// Affects every active voice; the value also applies to voices built
    /// later.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;

        if let Some(ctx) = &self.context {
            ctx.shared.set_volume_scalar(volume);
            let now = ctx.shared.now();
            let mut bank = ctx.shared.bank.lock();
            let current = bank.master.value_at(now);
            bank.master.set_value_at(current, now);
            bank.master
                .linear_ramp_to(volume, now + f64::from(FADE_DURATION));
        }
        log::debug!("volume set to {:.2}", volume);
    }

    /// Add or remove the perfect-fifth overlay without touching the main
    /// tone. No-op unless something is playing.
    pub fn toggle_perfect_fifth(&mut self, enabled: bool) {
        let Some(ctx) = &self.context else { return };
        let shared = &ctx.shared;
        if !shared.playing.load(Ordering::SeqCst) {
            return;
        }
        let config = {
            let mut current = shared.current.lock();
            let Some(config) = current.as_mut() else { return };
            config.play_perfect_fifth = enabled;
            *config
        };
        log::debug!(
            "perfect fifth {}",
            if enabled { "enabled" } else { "disabled" }
        );

        let now = shared.now();
        let volume = shared.volume();
        let retired = {
            let mut bank = shared.bank.lock();
            let retired = retire_fifth(&mut bank, now, FADE_DURATION);
            if enabled {
                let topology = ToneTopology::classify_fifth(&config);
                let (group, _) =
                    build_group(&mut bank, topology, FIFTH_GAIN * volume, FADE_DURATION, now);
                bank.fifth.push(group);
            }
            retired
        };
        if !retired.is_empty() {
            schedule_release(
                shared,
                &self.scheduler.handle(),
                FADE_DURATION,
                retired,
                Vec::new(),
            );
        }
    }

    /// Crossfade to a new tone: fade the current graph out over 100 ms, hold
    /// a 50 ms silent gap, then build and fade in the new graph.
    pub fn transition_to(&mut self, request: ToneRequest) -> Result<(), AudioInitError> {
        log::info!("transition to {:.2} Hz", request.frequency);
        self.stop_with_fade(FADE_DURATION);
        self.play(transition_request(request))
    }

    pub fn is_playing(&self) -> bool {
        self.context
            .as_ref()
            .map(|ctx| ctx.shared.playing.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn current_tone(&self) -> Option<ToneConfig> {
        self.context
            .as_ref()
            .and_then(|ctx| *ctx.shared.current.lock())
    }

    fn ensure_shared(&mut self) -> Result<Arc<EngineShared>, AudioInitError> {
        if self.context.is_none() {
            let ctx = EngineContext::open(self.device_name.as_deref(), &self.config, self.volume)?;
            self.context = Some(ctx);
        }
        self.context
            .as_ref()
            .map(|ctx| Arc::clone(&ctx.shared))
            .ok_or(AudioInitError::NoDevice)
    }
}

impl Default for TonePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TonePlayer {
    fn drop(&mut self) {
        // Timers first; the scheduler and stream follow in field order.
        if let Some(ctx) = &self.context {
            ctx.shared.cancel_timers();
        }
    }
}

/// Adjust a request for the transition path: fade-out plus gap before the
/// deferred fade-in begins.
fn transition_request(mut request: ToneRequest) -> ToneRequest {
    request.fade_in_delay_ms = ((FADE_DURATION + TRANSITION_GAP) * 1000.0).round() as u64;
    request.fade_in_duration = FADE_DURATION;
    request
}

/// On-duration of one isochronic cycle: half the period minus the edge fade.
fn iso_on_duration(beat_hz: f32) -> f64 {
    (1.0 / (2.0 * f64::from(beat_hz)) - ISO_EDGE_FADE).max(0.0)
}

/// Construct one voice group for the given topology. Returns the beat rate
/// when the group needs the isochronic modulator attached.
fn build_group(
    bank: &mut VoiceBank,
    topology: ToneTopology,
    target: f32,
    fade: f32,
    now: f64,
) -> (VoiceGroup, Option<f32>) {
    let sample_rate = bank.sample_rate();
    let id = bank.alloc_id();
    let mut gain = Param::new(0.0);
    gain.set_value_at(0.0, now);

    match topology {
        ToneTopology::Isochronic { beat_hz } => {
            // Stays silent until the modulator's first pulse.
            let voice = OscVoice::new(BASE_CARRIER_HZ, sample_rate, None);
            (VoiceGroup::new(id, vec![voice], gain), Some(beat_hz))
        }
        ToneTopology::ExplicitBinaural { left_hz, right_hz }
        | ToneTopology::ImplicitBinaural { left_hz, right_hz } => {
            gain.linear_ramp_to(target, now + f64::from(fade));
            let voices = vec![
                OscVoice::new(left_hz, sample_rate, Some(Pan::Left)),
                OscVoice::new(right_hz, sample_rate, Some(Pan::Right)),
            ];
            (VoiceGroup::new(id, voices, gain), None)
        }
        ToneTopology::Mono { hz } => {
            gain.linear_ramp_to(target, now + f64::from(fade));
            let voice = OscVoice::new(hz, sample_rate, None);
            (VoiceGroup::new(id, vec![voice], gain), None)
        }
    }
}

/// Build every graph a request asks for: main tone, optional fifth overlay,
/// optional noise bed. Runs either inline from `play` or deferred on the
/// timer thread during a transition.
fn build_graphs(shared: &Arc<EngineShared>, scheduler: &SchedulerHandle, request: &ToneRequest) {
    let config = ToneConfig::from(request);
    let fade = request.fade_in_duration.max(0.0);
    let volume = shared.volume();

    // Generated outside the bank lock; the audio callback must not wait on
    // buffer generation.
    let noise_buffer = request
        .include_pink_noise
        .then(|| noise::generate_buffer(shared.sample_rate));

    let now = shared.now();
    let iso;
    let mut retired_groups = Vec::new();
    let mut retired_noise = Vec::new();
    {
        let mut bank = shared.bank.lock();

        let topology = ToneTopology::classify(&config);
        let (group, beat) = build_group(&mut bank, topology, volume, fade, now);
        iso = beat.map(|beat_hz| (beat_hz, group.id));
        bank.main.push(group);

        if config.play_perfect_fifth {
            retired_groups = retire_fifth(&mut bank, now, FADE_DURATION);
            let fifth = ToneTopology::classify_fifth(&config);
            let (group, _) = build_group(&mut bank, fifth, FIFTH_GAIN * volume, fade, now);
            bank.fifth.push(group);
        }

        if let Some(buffer) = noise_buffer {
            if let Some(mut old) = bank.noise.take() {
                fade_out(&mut old.gain, now, FADE_DURATION);
                retired_noise.push(old.id);
                bank.retiring_noise.push(old);
            }
            let id = bank.alloc_id();
            let mut gain = Param::new(0.0);
            gain.set_value_at(0.0, now);
            gain.linear_ramp_to(NOISE_GAIN, now + f64::from(fade));
            bank.noise = Some(NoiseVoice::new(id, buffer, gain));
        }
    }

    if !retired_groups.is_empty() || !retired_noise.is_empty() {
        schedule_release(shared, scheduler, FADE_DURATION, retired_groups, retired_noise);
    }
    if let Some((beat_hz, group_id)) = iso {
        start_isochronic(shared, scheduler, beat_hz, group_id);
    }
}

/// Attach the isochronic modulator to a main group: a repeating task at the
/// beat period that rewrites the group's amplitude schedule every cycle.
fn start_isochronic(
    shared: &Arc<EngineShared>,
    scheduler: &SchedulerHandle,
    beat_hz: f32,
    group_id: u64,
) {
    if beat_hz <= 0.0 {
        log::warn!("isochronic beat rate {} Hz ignored", beat_hz);
        return;
    }
    let period = Duration::from_secs_f64(1.0 / f64::from(beat_hz));
    let on_secs = iso_on_duration(beat_hz);
    let weak = Arc::downgrade(shared);

    let handle = scheduler.schedule_repeating(period, move || {
        let Some(shared) = weak.upgrade() else { return };
        if !shared.playing.load(Ordering::SeqCst) {
            return;
        }
        // Capture the device clock at fire time, not schedule time, so the
        // pulse envelope stays phase-correct under timer jitter.
        let volume = shared.volume();
        let now = shared.now();
        let mut bank = shared.bank.lock();
        let Some(group) = bank.main.iter_mut().find(|g| g.id == group_id) else {
            return;
        };
        let gain = &mut group.gain;
        gain.cancel_after(now);
        gain.set_value_at(0.0, now);
        gain.linear_ramp_to(volume, now + ISO_EDGE_FADE);
        gain.set_value_at(volume, now + ISO_EDGE_FADE + on_secs);
        gain.linear_ramp_to(0.0, now + ISO_EDGE_FADE + on_secs + ISO_EDGE_FADE);
    });

    let mut timers = shared.timers.lock();
    if let Some(old) = timers.isochronic.replace(handle) {
        old.cancel();
    }
}

/// Anchor the current value and ramp to silence.
fn fade_out(gain: &mut Param, now: f64, fade: f32) {
    let current = gain.value_at(now);
    gain.set_value_at(current, now);
    gain.linear_ramp_to(0.0, now + f64::from(fade));
}

/// Move every fifth group into the retiring list with a fade-out. Returns
/// the retired ids for the release task.
fn retire_fifth(bank: &mut VoiceBank, now: f64, fade: f32) -> Vec<u64> {
    let mut ids = Vec::new();
    for mut group in std::mem::take(&mut bank.fifth) {
        fade_out(&mut group.gain, now, fade);
        ids.push(group.id);
        bank.retiring.push(group);
    }
    ids
}

/// Fade out and retire everything live: main, fifth, and noise.
fn retire_all(bank: &mut VoiceBank, now: f64, fade: f32) -> (Vec<u64>, Vec<u64>) {
    let mut group_ids = Vec::new();
    let mut noise_ids = Vec::new();

    let live = std::mem::take(&mut bank.main)
        .into_iter()
        .chain(std::mem::take(&mut bank.fifth));
    for mut group in live {
        fade_out(&mut group.gain, now, fade);
        group_ids.push(group.id);
        bank.retiring.push(group);
    }
    if let Some(mut noise) = bank.noise.take() {
        fade_out(&mut noise.gain, now, fade);
        noise_ids.push(noise.id);
        bank.retiring_noise.push(noise);
    }

    (group_ids, noise_ids)
}

/// Drop the retired voices once the fade-out grace period has elapsed. Keyed
/// by id, so a late firing can never touch a newer graph.
fn schedule_release(
    shared: &Arc<EngineShared>,
    scheduler: &SchedulerHandle,
    fade: f32,
    group_ids: Vec<u64>,
    noise_ids: Vec<u64>,
) {
    let weak = Arc::downgrade(shared);
    let grace = Duration::from_secs_f64(f64::from(fade) * CLEANUP_GRACE);
    scheduler.schedule_once(grace, move || {
        let Some(shared) = weak.upgrade() else { return };
        let mut bank = shared.bank.lock();
        for id in &group_ids {
            bank.release_group(*id);
        }
        for id in &noise_ids {
            bank.release_noise(*id);
        }
    });
}

/// The full stop path: cancel timers, fade everything, schedule the release.
/// Idempotent — an idle engine schedules nothing.
fn stop_graphs(shared: &Arc<EngineShared>, scheduler: &SchedulerHandle, fade_secs: f32) {
    let fade = fade_secs.max(0.0);

    shared.cancel_timers();
    shared.playing.store(false, Ordering::SeqCst);
    *shared.current.lock() = None;

    let now = shared.now();
    let (group_ids, noise_ids) = {
        let mut bank = shared.bank.lock();
        retire_all(&mut bank, now, fade)
    };
    if group_ids.is_empty() && noise_ids.is_empty() {
        return;
    }

    log::info!(
        "stop: fading {} voice group(s) over {:.0} ms",
        group_ids.len(),
        fade * 1000.0
    );
    schedule_release(shared, scheduler, fade, group_ids, noise_ids);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    fn config(frequency: f32) -> ToneConfig {
        ToneConfig::from(&ToneRequest::new(frequency))
    }

    #[test]
    fn test_low_frequency_classifies_as_implicit_binaural() {
        // 10 Hz is a beat rate: stereo pair at (400, 410).
        let topology = ToneTopology::classify(&config(10.0));
        assert_eq!(
            topology,
            ToneTopology::ImplicitBinaural {
                left_hz: 400.0,
                right_hz: 410.0
            }
        );
    }

    #[test]
    fn test_threshold_frequency_classifies_as_mono() {
        // 40 is not < 40: single unpanned oscillator.
        let topology = ToneTopology::classify(&config(40.0));
        assert_eq!(topology, ToneTopology::Mono { hz: 40.0 });

        let topology = ToneTopology::classify(&config(528.0));
        assert_eq!(topology, ToneTopology::Mono { hz: 528.0 });
    }

    #[test]
    fn test_explicit_carriers_win_over_threshold() {
        let mut cfg = config(10.0);
        cfg.carrier_left = Some(200.0);
        cfg.carrier_right = Some(210.0);
        assert_eq!(
            ToneTopology::classify(&cfg),
            ToneTopology::ExplicitBinaural {
                left_hz: 200.0,
                right_hz: 210.0
            }
        );
    }

    #[test]
    fn test_isochronic_wins_over_everything() {
        let mut cfg = config(6.0);
        cfg.carrier_left = Some(200.0);
        cfg.carrier_right = Some(210.0);
        cfg.is_isochronic = true;
        assert_eq!(
            ToneTopology::classify(&cfg),
            ToneTopology::Isochronic { beat_hz: 6.0 }
        );
    }

    #[test]
    fn test_fifth_scales_carriers_by_three_halves() {
        // Implicit pair: (400, 410) -> (600, 615).
        assert_eq!(
            ToneTopology::classify_fifth(&config(10.0)),
            ToneTopology::ImplicitBinaural {
                left_hz: 600.0,
                right_hz: 615.0
            }
        );

        let mut cfg = config(10.0);
        cfg.carrier_left = Some(200.0);
        cfg.carrier_right = Some(210.0);
        assert_eq!(
            ToneTopology::classify_fifth(&cfg),
            ToneTopology::ExplicitBinaural {
                left_hz: 300.0,
                right_hz: 315.0
            }
        );

        assert_eq!(
            ToneTopology::classify_fifth(&config(528.0)),
            ToneTopology::Mono { hz: 792.0 }
        );
    }

    #[test]
    fn test_fifth_of_isochronic_uses_carrier_pair() {
        // An isochronic 6 Hz tone still gets a plain stereo fifth.
        assert_eq!(
            ToneTopology::classify_fifth(&ToneConfig {
                frequency: 6.0,
                carrier_left: None,
                carrier_right: None,
                play_perfect_fifth: true,
                is_isochronic: true,
            }),
            ToneTopology::ImplicitBinaural {
                left_hz: 600.0,
                right_hz: 609.0
            }
        );
    }

    #[test]
    fn test_iso_on_duration() {
        // 6 Hz beat: 1/(2*6) - 0.005 seconds at full amplitude per cycle.
        let on = iso_on_duration(6.0);
        assert!((on - (1.0 / 12.0 - 0.005)).abs() < 1e-9, "on was {}", on);

        // Degenerate high beat rates clamp to zero instead of going
        // negative.
        assert_eq!(iso_on_duration(200.0), 0.0);
    }

    #[test]
    fn test_volume_clamps_without_throwing() {
        let mut player = TonePlayer::new();
        player.set_volume(1.7);
        assert_eq!(player.volume(), 1.0);
        player.set_volume(-0.3);
        assert_eq!(player.volume(), 0.0);
        player.set_volume(0.35);
        assert_eq!(player.volume(), 0.35);
    }

    #[test]
    fn test_stop_when_idle_is_a_no_op() {
        let mut player = TonePlayer::new();
        player.stop();
        player.stop();
        assert!(!player.is_playing());
        assert!(player.current_tone().is_none());
    }

    #[test]
    fn test_transition_request_defers_past_fade_and_gap() {
        let request = transition_request(ToneRequest::new(528.0));
        assert_eq!(request.fade_in_delay_ms, 150);
        assert_eq!(request.fade_in_duration, FADE_DURATION);
    }

    #[test]
    fn test_build_group_frequencies_and_targets() {
        let mut bank = VoiceBank::new(SR, 0.5);

        let (group, beat) = build_group(
            &mut bank,
            ToneTopology::ImplicitBinaural {
                left_hz: 400.0,
                right_hz: 410.0,
            },
            0.5,
            FADE_DURATION,
            0.0,
        );
        assert!(beat.is_none());
        assert_eq!(group.voices.len(), 2);
        assert_eq!(group.voices[0].frequency, 400.0);
        assert_eq!(group.voices[0].pan, Some(Pan::Left));
        assert_eq!(group.voices[1].frequency, 410.0);
        assert_eq!(group.voices[1].pan, Some(Pan::Right));
        // Starts silent, reaches its target at the end of the fade.
        assert_eq!(group.gain.value_at(0.0), 0.0);
        assert!((group.gain.value_at(f64::from(FADE_DURATION)) - 0.5).abs() < 1e-6);

        let (group, beat) = build_group(
            &mut bank,
            ToneTopology::Isochronic { beat_hz: 6.0 },
            0.5,
            FADE_DURATION,
            0.0,
        );
        assert_eq!(beat, Some(6.0));
        assert_eq!(group.voices.len(), 1);
        assert_eq!(group.voices[0].frequency, BASE_CARRIER_HZ);
        assert_eq!(group.voices[0].pan, None);
        // No onset ramp: the modulator owns this gain.
        assert_eq!(group.gain.value_at(1.0), 0.0);
    }

    #[test]
    fn test_retire_all_fades_every_target_to_zero() {
        let mut bank = VoiceBank::new(SR, 1.0);

        let (group, _) = build_group(
            &mut bank,
            ToneTopology::Mono { hz: 528.0 },
            1.0,
            FADE_DURATION,
            0.0,
        );
        bank.main.push(group);
        let (group, _) = build_group(
            &mut bank,
            ToneTopology::Mono { hz: 792.0 },
            0.5,
            FADE_DURATION,
            0.0,
        );
        bank.fifth.push(group);

        // Stop at t = 1.0, well after the fade-in completed.
        let (group_ids, noise_ids) = retire_all(&mut bank, 1.0, FADE_DURATION);
        assert_eq!(group_ids.len(), 2);
        assert!(noise_ids.is_empty());
        assert!(bank.main.is_empty());
        assert!(bank.fifth.is_empty());
        assert_eq!(bank.retiring.len(), 2);

        // Every retired amplitude is zero from the fade end onward, so no
        // two main graphs ever hold nonzero targets at the same instant.
        for group in &bank.retiring {
            assert_eq!(group.gain.value_at(1.0 + f64::from(FADE_DURATION)), 0.0);
            assert_eq!(group.gain.value_at(5.0), 0.0);
        }

        // Releasing by id empties the bank.
        for id in group_ids {
            bank.release_group(id);
        }
        assert!(bank.is_idle());
    }

    #[test]
    fn test_retire_fifth_leaves_main_untouched() {
        let mut bank = VoiceBank::new(SR, 1.0);
        let (group, _) = build_group(
            &mut bank,
            ToneTopology::Mono { hz: 528.0 },
            1.0,
            FADE_DURATION,
            0.0,
        );
        bank.main.push(group);
        let (group, _) = build_group(
            &mut bank,
            ToneTopology::Mono { hz: 792.0 },
            0.5,
            FADE_DURATION,
            0.0,
        );
        bank.fifth.push(group);

        let retired = retire_fifth(&mut bank, 1.0, FADE_DURATION);
        assert_eq!(retired.len(), 1);
        assert!(bank.fifth.is_empty());

        // The main tone keeps playing at its full target.
        assert_eq!(bank.main.len(), 1);
        assert!((bank.main[0].gain.value_at(2.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_second_retire_has_nothing_to_do() {
        let mut bank = VoiceBank::new(SR, 1.0);
        let (group, _) = build_group(
            &mut bank,
            ToneTopology::Mono { hz: 440.0 },
            1.0,
            FADE_DURATION,
            0.0,
        );
        bank.main.push(group);

        let (first, _) = retire_all(&mut bank, 0.5, FADE_DURATION);
        assert_eq!(first.len(), 1);

        // A repeated stop finds no live voices and schedules no release.
        let (second, second_noise) = retire_all(&mut bank, 0.6, FADE_DURATION);
        assert!(second.is_empty());
        assert!(second_noise.is_empty());
    }

    #[test]
    fn test_serde_request_fills_defaults() {
        let request: ToneRequest = serde_json::from_str(r#"{"frequency": 7.83}"#).unwrap();
        assert_eq!(request.frequency, 7.83);
        assert_eq!(request.fade_in_duration, FADE_DURATION);
        assert!(!request.is_isochronic);
        assert!(request.carrier_left.is_none());
    }
}
