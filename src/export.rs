//! Tabular export
//!
//! Flattens a [`FeatureSet`] into rows for the host's exporter. Writing files
//! and sharing them is the host's business; this module only produces the rows
//! and, for convenience, their CSV text.

use crate::clock::Millis;
use crate::error::AuthError;
use crate::features::FeatureSet;
use crate::types::KeySymbol;
use serde::{Deserialize, Serialize};

/// Column headers, in order
pub const EXPORT_HEADERS: [&str; 11] = [
    "Data Type",
    "Key",
    "Time Interval (ms)",
    "Timestamp",
    "Hold Duration (ms)",
    "Touch Position X",
    "Touch Position Y",
    "Hover Data X",
    "Hover Data Y",
    "Touch Side",
    "Total Time Spent (ms)",
];

/// What a row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    TimeInterval,
    KeyRelease,
    HoldDuration,
    HoverData,
}

impl RowKind {
    pub fn label(&self) -> &'static str {
        match self {
            RowKind::TimeInterval => "Time Interval",
            RowKind::KeyRelease => "Key Release",
            RowKind::HoldDuration => "Hold Duration",
            RowKind::HoverData => "Hover Data",
        }
    }
}

/// One exported row. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub kind: RowKind,
    pub key: Option<KeySymbol>,
    pub interval_ms: Option<Millis>,
    pub timestamp: Option<Millis>,
    pub hold_ms: Option<Millis>,
    pub touch_x: Option<f64>,
    pub touch_y: Option<f64>,
    pub hover_x: Option<f64>,
    pub hover_y: Option<f64>,
    pub touch_side: Option<String>,
    pub total_time_ms: Millis,
}

impl ExportRow {
    fn cells(&self) -> [String; 11] {
        fn cell<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        [
            self.kind.label().to_string(),
            cell(&self.key),
            cell(&self.interval_ms),
            cell(&self.timestamp),
            cell(&self.hold_ms),
            cell(&self.touch_x),
            cell(&self.touch_y),
            cell(&self.hover_x),
            cell(&self.hover_y),
            cell(&self.touch_side),
            self.total_time_ms.to_string(),
        ]
    }
}

/// Rows for one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTable {
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    /// Build rows grouped as intervals, releases, hold durations, then hover
    /// points. Touch position and side repeat the last touch on every key row.
    pub fn from_features(features: &FeatureSet) -> Self {
        let touch_x = features.last_touch.map(|p| p.x);
        let touch_y = features.last_touch.map(|p| p.y);
        let touch_side = features.touch_side.map(|side| side.as_str().to_string());
        let total_time_ms = features.total_time_ms;

        let key_row = |kind: RowKind, key: KeySymbol| ExportRow {
            kind,
            key: Some(key),
            interval_ms: None,
            timestamp: None,
            hold_ms: None,
            touch_x,
            touch_y,
            hover_x: None,
            hover_y: None,
            touch_side: touch_side.clone(),
            total_time_ms,
        };

        let mut rows = Vec::new();

        for keystroke in &features.keystrokes {
            if let Some(interval) = keystroke.interval_ms {
                rows.push(ExportRow {
                    interval_ms: Some(interval),
                    ..key_row(RowKind::TimeInterval, keystroke.symbol)
                });
            }
        }

        let releases = features.releases();
        for keystroke in &releases {
            rows.push(ExportRow {
                timestamp: keystroke.release_ms,
                hold_ms: keystroke.hold_ms,
                ..key_row(RowKind::KeyRelease, keystroke.symbol)
            });
        }
        for keystroke in &releases {
            rows.push(ExportRow {
                hold_ms: keystroke.hold_ms,
                ..key_row(RowKind::HoldDuration, keystroke.symbol)
            });
        }

        for point in &features.hover_path {
            rows.push(ExportRow {
                kind: RowKind::HoverData,
                key: None,
                interval_ms: None,
                timestamp: None,
                hold_ms: None,
                touch_x: None,
                touch_y: None,
                hover_x: Some(point.x),
                hover_y: Some(point.y),
                touch_side: touch_side.clone(),
                total_time_ms,
            });
        }

        Self { rows }
    }

    pub fn headers(&self) -> &'static [&'static str] {
        &EXPORT_HEADERS
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render with a header line
    pub fn to_csv(&self) -> Result<String, AuthError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(EXPORT_HEADERS)
            .map_err(|e| AuthError::ExportError(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.cells())
                .map_err(|e| AuthError::ExportError(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AuthError::ExportError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| AuthError::ExportError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use crate::recorder::Attempt;
    use crate::types::InputEvent;
    use pretty_assertions::assert_eq;

    fn sample_features() -> FeatureSet {
        let events = vec![
            InputEvent::Touch { x: 10.0, y: 50.0, t: 0 },
            InputEvent::KeyPress { symbol: '1', t: 0 },
            InputEvent::KeyRelease { symbol: '1', t: 90 },
            InputEvent::KeyPress { symbol: '2', t: 300 },
            InputEvent::KeyRelease { symbol: '2', t: 360 },
            InputEvent::Hover { x: 12.5, y: 40.0, t: 400 },
        ];
        FeatureExtractor::default().extract(&Attempt::from_events(0, 1_000, events))
    }

    #[test]
    fn test_row_layout() {
        let table = ExportTable::from_features(&sample_features());
        let kinds: Vec<RowKind> = table.rows.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RowKind::TimeInterval,
                RowKind::KeyRelease,
                RowKind::KeyRelease,
                RowKind::HoldDuration,
                RowKind::HoldDuration,
                RowKind::HoverData,
            ]
        );

        let interval = &table.rows[0];
        assert_eq!(interval.key, Some('2'));
        assert_eq!(interval.interval_ms, Some(300));

        let release = &table.rows[1];
        assert_eq!(release.timestamp, Some(90));
        assert_eq!(release.hold_ms, Some(90));
        assert_eq!(release.touch_side.as_deref(), Some("bottom"));
        assert_eq!(release.total_time_ms, 1_000);
    }

    #[test]
    fn test_csv_rendering() {
        let csv = ExportTable::from_features(&sample_features())
            .to_csv()
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], EXPORT_HEADERS.join(","));
        assert_eq!(lines[1], "Time Interval,2,300,,,10,50,,,bottom,1000");
        assert_eq!(lines[2], "Key Release,1,,90,90,10,50,,,bottom,1000");
        assert_eq!(lines[6], "Hover Data,,,,,,,12.5,40,bottom,1000");
    }

    #[test]
    fn test_empty_attempt_has_header_only() {
        let features = FeatureExtractor::default().extract(&Attempt::from_events(0, 0, vec![]));
        let table = ExportTable::from_features(&features);
        assert!(table.is_empty());
        assert_eq!(table.to_csv().unwrap().lines().count(), 1);
    }
}
