//! Free-text documentation attached to named nodes

/// Description of a named node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    pub text: String,
}

impl Description {
    /// Width used for emitted comments.
    pub const DEFAULT_WIDTH: usize = 80;

    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Lines wrapped at [`Description::DEFAULT_WIDTH`].
    pub fn lines(&self) -> Vec<String> {
        self.wrap(Self::DEFAULT_WIDTH)
    }

    /// True if the wrapped text takes more than one line.
    pub fn is_multiline(&self) -> bool {
        self.lines().len() > 1
    }

    /// Wrap the text into lines of at most `width` columns.
    ///
    /// Every source line is wrapped on its own, so blank lines survive.
    /// Words are never broken and whitespace inside a line is kept as is;
    /// only the whitespace at a wrap point is dropped. An empty text has no
    /// lines at all.
    pub fn wrap(&self, width: usize) -> Vec<String> {
        let mut lines = Vec::new();

        if self.text.is_empty() {
            return lines;
        }

        for source_line in self.text.split('\n') {
            wrap_line(source_line, width, &mut lines);
        }

        lines
    }
}

impl std::fmt::Display for Description {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Split a line into `(word, whitespace after it)` pairs.
fn words(line: &str) -> Vec<(&str, &str)> {
    let mut result = Vec::new();
    let mut rest = line;

    while !rest.is_empty() {
        let word_end = rest.find(is_blank).unwrap_or(rest.len());
        let (word, tail) = rest.split_at(word_end);
        let gap_end = tail.find(|c: char| !is_blank(c)).unwrap_or(tail.len());
        let (gap, tail) = tail.split_at(gap_end);
        result.push((word, gap));
        rest = tail;
    }

    result
}

fn wrap_line(line: &str, width: usize, out: &mut Vec<String>) {
    let body = line.trim_start_matches(is_blank);

    if body.trim_end_matches(is_blank).is_empty() {
        out.push(String::new());
        return;
    }

    let indent = &line[..line.len() - body.len()];
    let mut current = indent.to_string();
    let mut current_width = indent.chars().count();
    let mut has_word = false;
    let mut gap = "";

    for (word, next_gap) in words(body) {
        let word_width = word.chars().count();
        let gap_width = gap.chars().count();

        if has_word && current_width + gap_width + word_width > width {
            out.push(std::mem::take(&mut current));
            current_width = 0;
        } else if has_word {
            current.push_str(gap);
            current_width += gap_width;
        }

        current.push_str(word);
        current_width += word_width;
        has_word = true;
        gap = next_gap;
    }

    out.push(current);
}
