//! Per-frame vehicle label records used by the offline tools.
//!
//! One whitespace-separated record per line:
//! `begin_frame end_frame speed left_turn right_turn`, where the frame pair
//! describes an inclusive range and the turn flags are `0`/`1`. Legacy files
//! carry only the first three fields; missing flags read as off.

use std::fs;
use std::path::Path;

/// Speed and turn-signal annotation for an inclusive frame range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelRecord {
    pub begin_frame: u32,
    pub end_frame: u32,
    /// Speed in km/h.
    pub speed: f32,
    pub left_turn: bool,
    pub right_turn: bool,
}

impl LabelRecord {
    pub fn applies_to(&self, frame_id: u32) -> bool {
        frame_id >= self.begin_frame && frame_id <= self.end_frame
    }
}

fn parse_flag(token: &str, line_no: usize) -> Result<bool, String> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(format!("line {line_no}: bad turn flag {other:?}")),
    }
}

/// Parse label records from text, skipping blank lines.
pub fn parse_labels(text: &str) -> Result<Vec<LabelRecord>, String> {
    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 && fields.len() != 5 {
            return Err(format!(
                "line {line_no}: expected 3 or 5 fields, got {}",
                fields.len()
            ));
        }
        let begin_frame: u32 = fields[0]
            .parse()
            .map_err(|e| format!("line {line_no}: bad begin frame: {e}"))?;
        let end_frame: u32 = fields[1]
            .parse()
            .map_err(|e| format!("line {line_no}: bad end frame: {e}"))?;
        if end_frame < begin_frame {
            return Err(format!("line {line_no}: frame range is reversed"));
        }
        let speed: f32 = fields[2]
            .parse()
            .map_err(|e| format!("line {line_no}: bad speed: {e}"))?;
        let (left_turn, right_turn) = if fields.len() == 5 {
            (parse_flag(fields[3], line_no)?, parse_flag(fields[4], line_no)?)
        } else {
            (false, false)
        };
        records.push(LabelRecord {
            begin_frame,
            end_frame,
            speed,
            left_turn,
            right_turn,
        });
    }
    Ok(records)
}

/// Render records back to the on-disk text format.
pub fn format_labels(records: &[LabelRecord]) -> String {
    let mut out = String::new();
    for r in records {
        out.push_str(&format!(
            "{} {} {} {} {}\n",
            r.begin_frame,
            r.end_frame,
            r.speed,
            r.left_turn as u8,
            r.right_turn as u8
        ));
    }
    out
}

pub fn read_labels(path: &Path) -> Result<Vec<LabelRecord>, String> {
    let text =
        fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    parse_labels(&text)
}

pub fn write_labels(path: &Path, records: &[LabelRecord]) -> Result<(), String> {
    fs::write(path, format_labels(records))
        .map_err(|e| format!("write {}: {e}", path.display()))
}

/// Speed for a frame, from the last record covering it.
pub fn speed_at(records: &[LabelRecord], frame_id: u32) -> Option<f32> {
    records
        .iter()
        .rev()
        .find(|r| r.applies_to(frame_id))
        .map(|r| r.speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let records = vec![
            LabelRecord {
                begin_frame: 0,
                end_frame: 40,
                speed: 32.0,
                left_turn: false,
                right_turn: true,
            },
            LabelRecord {
                begin_frame: 41,
                end_frame: 90,
                speed: 18.5,
                left_turn: true,
                right_turn: false,
            },
        ];
        let text = format_labels(&records);
        assert_eq!(parse_labels(&text).unwrap(), records);
    }

    #[test]
    fn legacy_three_field_lines_parse() {
        let parsed = parse_labels("5 5 24\n6 6 25\n").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].speed, 24.0);
        assert!(!parsed[0].left_turn);
        assert!(!parsed[0].right_turn);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(parse_labels("1 2\n").is_err());
        assert!(parse_labels("3 1 20\n").is_err());
        assert!(parse_labels("1 2 20 2 0\n").is_err());
    }

    #[test]
    fn speed_lookup_prefers_latest_record() {
        let records = parse_labels("0 100 30\n50 60 10 0 0\n").unwrap();
        assert_eq!(speed_at(&records, 55), Some(10.0));
        assert_eq!(speed_at(&records, 10), Some(30.0));
        assert_eq!(speed_at(&records, 101), None);
    }
}
