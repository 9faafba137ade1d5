//! Trigger-channel event detection.
//!
//! Follows `mne.find_events` with `output='onset'` and
//! `consecutive='increasing'`: an event starts where the channel steps to a
//! non-zero value that is larger than the previous one (a step down to a
//! smaller non-zero value is the tail of the previous trigger). A value held
//! for fewer than `min_duration` seconds is ignored. A trigger already high
//! on the first sample is not an event.

/// One trigger onset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Sample index of the onset.
    pub sample: usize,
    /// Trigger value before the onset.
    pub previous: i64,
    pub code: i64,
}

/// Detect events on a trigger channel sampled at `sfreq`.
pub fn find_events(stim: &[f64], sfreq: f64, min_duration: f64) -> Vec<Event> {
    let codes: Vec<i64> = stim.iter().map(|v| v.round() as i64).collect();
    let min_samples = (min_duration * sfreq).round().max(1.0) as usize;

    let mut events = Vec::new();
    let mut i = 1;
    while i < codes.len() {
        let (prev, cur) = (codes[i - 1], codes[i]);
        if cur == prev {
            i += 1;
            continue;
        }
        let run = codes[i..].iter().take_while(|&&c| c == cur).count();
        if cur != 0 && (prev == 0 || cur > prev) && run >= min_samples {
            events.push(Event { sample: i, previous: prev, code: cur });
        }
        i += run;
    }
    tracing::debug!(n_events = events.len(), min_samples, "found events");
    events
}

/// Events whose code is in `codes` (all events when `codes` is empty).
pub fn select_events(events: &[Event], codes: &[i64]) -> Vec<Event> {
    events
        .iter()
        .filter(|e| codes.is_empty() || codes.contains(&e.code))
        .copied()
        .collect()
}
