use super::font::TextMeasurer;
use crate::timing::TimedWord;

/// Number of consecutive lines shown together
pub const LINES_PER_PAGE: usize = 2;

/// A word placed on a subtitle line, with its measured width at the base
/// font size
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutWord {
    pub timing: TimedWord,
    pub width: f32,
}

/// One line of subtitle words
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubtitleLine {
    pub words: Vec<LaidOutWord>,
    /// Running width used for breaking: every word plus one trailing space
    pub width: f32,
}

/// Visual state of a word at a given scene time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordState {
    /// Not spoken yet
    Upcoming,
    /// Being spoken
    Active,
    /// Already spoken
    Past,
}

impl WordState {
    pub fn at(time: f64, word: &TimedWord) -> Self {
        if word.contains(time) {
            Self::Active
        } else if time >= word.end_time {
            Self::Past
        } else {
            Self::Upcoming
        }
    }
}

/// Lines shown at one instant, plus where the active line sits
#[derive(Debug, Clone, Copy)]
pub struct VisiblePage<'a> {
    /// Index of `lines[0]` among all lines
    pub first_line: usize,
    /// Index of the active line among all lines
    pub active_line: usize,
    pub lines: &'a [SubtitleLine],
}

impl VisiblePage<'_> {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Break timed words into lines no wider than `max_width`.
///
/// Greedy: each word (plus one trailing space) is appended to the current
/// line while the running width stays within `max_width`; otherwise the line
/// is closed and the word starts the next one. A word wider than `max_width`
/// on its own still gets a line.
pub fn layout<M: TextMeasurer + ?Sized>(
    timings: &[TimedWord],
    max_width: f32,
    measurer: &M,
    font_px: f32,
) -> Vec<SubtitleLine> {
    let space = measurer.space_width(font_px);
    let mut lines = Vec::new();
    let mut current = SubtitleLine::default();

    for timing in timings {
        let width = measurer.word_width(&timing.word, font_px);
        let advance = width + space;

        if !current.words.is_empty() && current.width + advance > max_width {
            lines.push(std::mem::take(&mut current));
        }

        current.width += advance;
        current.words.push(LaidOutWord {
            timing: timing.clone(),
            width,
        });
    }

    if !current.words.is_empty() {
        lines.push(current);
    }
    lines
}

/// Index of the line that should be highlighted at `time`.
///
/// The line holding the word being spoken wins; during a pause, the line of
/// the most recently finished word; before the first word, line 0.
pub fn active_line_index(lines: &[SubtitleLine], time: f64) -> usize {
    let mut last_completed: Option<(f64, usize)> = None;

    for (index, line) in lines.iter().enumerate() {
        for word in &line.words {
            if word.timing.contains(time) {
                return index;
            }
            if word.timing.end_time <= time
                && last_completed.map_or(true, |(end, _)| word.timing.end_time >= end)
            {
                last_completed = Some((word.timing.end_time, index));
            }
        }
    }

    last_completed.map_or(0, |(_, index)| index)
}

/// The page (at most [`LINES_PER_PAGE`] consecutive lines) containing the
/// active line at `time`
pub fn select_visible_page(lines: &[SubtitleLine], time: f64) -> VisiblePage<'_> {
    if lines.is_empty() {
        return VisiblePage {
            first_line: 0,
            active_line: 0,
            lines,
        };
    }

    let active_line = active_line_index(lines, time);
    let first_line = (active_line / LINES_PER_PAGE) * LINES_PER_PAGE;
    let end = (first_line + LINES_PER_PAGE).min(lines.len());

    VisiblePage {
        first_line,
        active_line,
        lines: &lines[first_line..end],
    }
}
