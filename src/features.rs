//! Feature extraction
//!
//! Derives keystroke timing and touch-geometry features from a sealed attempt.
//! Extraction is a pure function of the event log and is safe to call from any
//! thread once the attempt is sealed.

use crate::clock::Millis;
use crate::config::TouchConfig;
use crate::recorder::Attempt;
use crate::types::{InputEvent, KeySymbol, TouchPoint, TouchSide};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Timing of one keystroke, in press order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeFeature {
    pub symbol: KeySymbol,
    pub press_ms: Millis,
    /// Missing when the key was still held when the attempt closed
    pub release_ms: Option<Millis>,
    /// `release_ms - press_ms`
    pub hold_ms: Option<Millis>,
    /// Time since the previous press; undefined for the first keystroke
    pub interval_ms: Option<Millis>,
}

/// Features derived from one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Keystrokes in press order
    pub keystrokes: Vec<KeystrokeFeature>,
    /// Releases that had no earlier unmatched press of the same symbol
    pub unmatched_releases: u32,
    /// Position of the last touch
    pub last_touch: Option<TouchPoint>,
    /// Classification of the last touch
    pub touch_side: Option<TouchSide>,
    /// Pointer-move trace
    pub hover_path: Vec<TouchPoint>,
    pub backspace_count: u32,
    pub honeypot_count: u32,
    pub motion_sample_count: u32,
    /// Time between opening and sealing the attempt
    pub total_time_ms: Millis,
}

impl FeatureSet {
    /// Mean hold duration over released keys
    pub fn mean_hold_ms(&self) -> Option<f64> {
        mean(self.keystrokes.iter().filter_map(|k| k.hold_ms))
    }

    /// Mean inter-key interval
    pub fn mean_interval_ms(&self) -> Option<f64> {
        mean(self.keystrokes.iter().filter_map(|k| k.interval_ms))
    }

    /// Keystrokes that were released, ordered by release time
    pub fn releases(&self) -> Vec<&KeystrokeFeature> {
        let mut released: Vec<&KeystrokeFeature> = self
            .keystrokes
            .iter()
            .filter(|k| k.release_ms.is_some())
            .collect();
        released.sort_by_key(|k| k.release_ms);
        released
    }
}

fn mean(values: impl Iterator<Item = Millis>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u64), |(s, c), v| (s + v as f64, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Extracts a [`FeatureSet`] from a sealed attempt
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    touch: TouchConfig,
}

impl FeatureExtractor {
    pub fn new(touch: TouchConfig) -> Self {
        Self { touch }
    }

    /// Derive features from an attempt's event log
    pub fn extract(&self, attempt: &Attempt) -> FeatureSet {
        let events = attempt.events();

        let (keystrokes, unmatched_releases) = pair_keystrokes(events);

        let mut last_touch = None;
        let mut hover_path = Vec::new();
        let mut backspace_count = 0;
        let mut honeypot_count = 0;
        let mut motion_sample_count = 0;

        for event in events {
            match event {
                InputEvent::Touch { x, y, .. } => last_touch = Some(TouchPoint { x: *x, y: *y }),
                InputEvent::Hover { x, y, .. } => hover_path.push(TouchPoint { x: *x, y: *y }),
                InputEvent::Backspace { .. } => backspace_count += 1,
                InputEvent::Honeypot { .. } => honeypot_count += 1,
                InputEvent::MotionSample(_) => motion_sample_count += 1,
                InputEvent::KeyPress { .. } | InputEvent::KeyRelease { .. } => {}
            }
        }

        let touch_side = last_touch.map(|point| classify_touch(point, &self.touch));

        FeatureSet {
            keystrokes,
            unmatched_releases,
            last_touch,
            touch_side,
            hover_path,
            backspace_count,
            honeypot_count,
            motion_sample_count,
            total_time_ms: attempt.duration_ms(),
        }
    }
}

/// Pair presses with releases by temporal order.
///
/// A release closes the oldest still-open press of the same symbol, so a digit
/// entered twice in quick succession is never cross-paired.
fn pair_keystrokes(events: &[InputEvent]) -> (Vec<KeystrokeFeature>, u32) {
    let mut keystrokes: Vec<KeystrokeFeature> = Vec::new();
    let mut open_presses: HashMap<KeySymbol, VecDeque<usize>> = HashMap::new();
    let mut unmatched_releases = 0;

    for event in events {
        match *event {
            InputEvent::KeyPress { symbol, t } => {
                let interval_ms = keystrokes.last().map(|prev| t.saturating_sub(prev.press_ms));
                open_presses
                    .entry(symbol)
                    .or_default()
                    .push_back(keystrokes.len());
                keystrokes.push(KeystrokeFeature {
                    symbol,
                    press_ms: t,
                    release_ms: None,
                    hold_ms: None,
                    interval_ms,
                });
            }
            InputEvent::KeyRelease { symbol, t } => {
                match open_presses.get_mut(&symbol).and_then(VecDeque::pop_front) {
                    Some(index) => {
                        let keystroke = &mut keystrokes[index];
                        keystroke.release_ms = Some(t);
                        keystroke.hold_ms = Some(t.saturating_sub(keystroke.press_ms));
                    }
                    None => unmatched_releases += 1,
                }
            }
            _ => {}
        }
    }

    (keystrokes, unmatched_releases)
}

/// Classify where on a key a touch landed.
///
/// The x axis is checked first: any touch within `tolerance` of the horizontal
/// center is `Center` regardless of its y position. Only touches inside the
/// horizontal tolerance band edges fall through to the y checks.
pub fn classify_touch(point: TouchPoint, geometry: &TouchConfig) -> TouchSide {
    let center_x = geometry.button_width / 2.0;
    let center_y = geometry.button_height / 2.0;
    let tolerance = geometry.tolerance;

    if (point.x - center_x).abs() < tolerance {
        TouchSide::Center
    } else if point.x < center_x - tolerance {
        TouchSide::Left
    } else if point.x > center_x + tolerance {
        TouchSide::Right
    } else if (point.y - center_y).abs() < tolerance {
        TouchSide::Center
    } else if point.y < center_y - tolerance {
        TouchSide::Top
    } else {
        TouchSide::Bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attempt(events: Vec<InputEvent>) -> Attempt {
        let end = events.iter().map(InputEvent::timestamp).max().unwrap_or(0);
        Attempt::from_events(0, end, events)
    }

    fn press(symbol: char, t: Millis) -> InputEvent {
        InputEvent::KeyPress { symbol, t }
    }

    fn release(symbol: char, t: Millis) -> InputEvent {
        InputEvent::KeyRelease { symbol, t }
    }

    #[test]
    fn test_repeated_symbol_pairs_by_temporal_order() {
        let features = FeatureExtractor::default().extract(&attempt(vec![
            press('3', 0),
            press('3', 5),
            release('3', 8),
            release('3', 12),
        ]));

        let holds: Vec<Option<Millis>> = features.keystrokes.iter().map(|k| k.hold_ms).collect();
        assert_eq!(holds, vec![Some(8), Some(7)]);
        assert_eq!(features.unmatched_releases, 0);
    }

    #[test]
    fn test_intervals_undefined_for_first_press() {
        let features = FeatureExtractor::default().extract(&attempt(vec![
            press('1', 100),
            release('1', 180),
            press('2', 400),
            release('2', 450),
            press('3', 650),
            release('3', 720),
        ]));

        let intervals: Vec<Option<Millis>> =
            features.keystrokes.iter().map(|k| k.interval_ms).collect();
        assert_eq!(intervals, vec![None, Some(300), Some(250)]);
        assert_eq!(features.mean_interval_ms(), Some(275.0));
        assert_eq!(features.mean_hold_ms(), Some(200.0 / 3.0));
    }

    #[test]
    fn test_mean_of_huge_holds_does_not_overflow() {
        let features = FeatureExtractor::default().extract(&attempt(vec![
            press('1', 0),
            release('1', u64::MAX - 1),
            press('2', 1),
            release('2', u64::MAX),
        ]));

        let mean = features.mean_hold_ms().unwrap();
        assert!(mean > 1.8e19);
    }

    #[test]
    fn test_orphan_release_and_unreleased_press() {
        let features = FeatureExtractor::default().extract(&attempt(vec![
            release('9', 10),
            press('4', 20),
        ]));

        assert_eq!(features.unmatched_releases, 1);
        assert_eq!(features.keystrokes.len(), 1);
        assert_eq!(features.keystrokes[0].release_ms, None);
        assert_eq!(features.keystrokes[0].hold_ms, None);
        assert!(features.releases().is_empty());
    }

    #[test]
    fn test_counts_and_last_touch() {
        let features = FeatureExtractor::default().extract(&attempt(vec![
            InputEvent::Touch { x: 5.0, y: 30.0, t: 1 },
            InputEvent::Hover { x: 1.0, y: 2.0, t: 2 },
            InputEvent::Backspace { t: 3 },
            InputEvent::Backspace { t: 4 },
            InputEvent::Honeypot { t: 5 },
            InputEvent::Touch { x: 30.0, y: 58.0, t: 6 },
            InputEvent::Hover { x: 3.0, y: 4.0, t: 7 },
        ]));

        assert_eq!(features.last_touch, Some(TouchPoint { x: 30.0, y: 58.0 }));
        assert_eq!(features.touch_side, Some(TouchSide::Center));
        assert_eq!(features.hover_path.len(), 2);
        assert_eq!(features.backspace_count, 2);
        assert_eq!(features.honeypot_count, 1);
        assert_eq!(features.total_time_ms, 7);
    }

    #[test]
    fn test_releases_sorted_by_release_time() {
        let features = FeatureExtractor::default().extract(&attempt(vec![
            press('1', 0),
            press('2', 10),
            release('2', 20),
            release('1', 30),
        ]));

        let symbols: Vec<char> = features.releases().iter().map(|k| k.symbol).collect();
        assert_eq!(symbols, vec!['2', '1']);
    }

    #[test]
    fn test_touch_center_on_x_check() {
        let geometry = TouchConfig::default();
        let side = classify_touch(TouchPoint { x: 30.0, y: 30.0 }, &geometry);
        assert_eq!(side, TouchSide::Center);

        // x inside the center band wins even at the top edge
        let side = classify_touch(TouchPoint { x: 35.0, y: 0.0 }, &geometry);
        assert_eq!(side, TouchSide::Center);
    }

    #[test]
    fn test_touch_sides() {
        let geometry = TouchConfig::default();
        assert_eq!(
            classify_touch(TouchPoint { x: 5.0, y: 30.0 }, &geometry),
            TouchSide::Left
        );
        assert_eq!(
            classify_touch(TouchPoint { x: 55.0, y: 30.0 }, &geometry),
            TouchSide::Right
        );
    }

    #[test]
    fn test_touch_band_edge_falls_through_to_y() {
        let geometry = TouchConfig::default();
        // |x - 30| == 20 exactly: not center, not strictly left or right
        assert_eq!(
            classify_touch(TouchPoint { x: 10.0, y: 30.0 }, &geometry),
            TouchSide::Center
        );
        assert_eq!(
            classify_touch(TouchPoint { x: 50.0, y: 2.0 }, &geometry),
            TouchSide::Top
        );
        assert_eq!(
            classify_touch(TouchPoint { x: 10.0, y: 55.0 }, &geometry),
            TouchSide::Bottom
        );
        assert_eq!(
            classify_touch(TouchPoint { x: 10.0, y: 50.0 }, &geometry),
            TouchSide::Bottom
        );
    }
}
