//! Splits file contents into bounded-size units for the detectors.

use serde::{Deserialize, Serialize};

/// Default number of lines per code unit.
pub const DEFAULT_UNIT_SIZE: usize = 300;

/// A contiguous slice of a file's lines submitted to the detectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnit {
    /// First line of the unit, 1-based.
    pub start_line: usize,
    /// Last line of the unit, 1-based (inclusive).
    pub end_line: usize,
    /// Text content of the unit.
    pub text: String,
}

/// Split text into non-overlapping windows of `unit_size` lines.
///
/// The last window may be shorter. Empty input yields exactly one empty
/// unit. Joining the unit texts with `\n` reconstructs the input.
pub fn chunk(text: &str, unit_size: usize) -> Vec<CodeUnit> {
    let unit_size = unit_size.max(1);
    let lines: Vec<&str> = text.split('\n').collect();

    lines
        .chunks(unit_size)
        .enumerate()
        .map(|(index, window)| {
            let start_line = index * unit_size + 1;
            CodeUnit {
                start_line,
                end_line: start_line + window.len() - 1,
                text: window.join("\n"),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{CodeUnit, chunk};

    fn numbered_lines(count: usize) -> String {
        (1..=count)
            .map(|n| format!("line {n}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn empty_input_yields_one_empty_unit() {
        let units = chunk("", 300);
        assert_eq!(
            units,
            vec![CodeUnit {
                start_line: 1,
                end_line: 1,
                text: String::new(),
            }]
        );
    }

    #[test]
    fn short_input_yields_single_unit() {
        let text = numbered_lines(5);
        let units = chunk(&text, 300);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, text);
        assert_eq!(units[0].start_line, 1);
        assert_eq!(units[0].end_line, 5);
    }

    #[test]
    fn unit_count_is_ceiling_of_line_count() {
        let text = numbered_lines(650);
        let units = chunk(&text, 300);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].end_line, 300);
        assert_eq!(units[1].start_line, 301);
        assert_eq!(units[2].start_line, 601);
        assert_eq!(units[2].end_line, 650);
    }

    #[test]
    fn joined_units_reconstruct_input() {
        let text = numbered_lines(7);
        let units = chunk(&text, 3);
        let joined = units
            .iter()
            .map(|unit| unit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(joined, text);
    }

    #[test]
    fn zero_unit_size_is_clamped() {
        let units = chunk("a\nb", 0);
        assert_eq!(units.len(), 2);
    }
}
