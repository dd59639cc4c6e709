use std::io::{self, BufRead};

/// A line read by [`SectionCursor`] with its position in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Line content without the trailing newline
    pub text: String,
    /// Byte offset of the first character of the line
    pub offset: u64,
    /// 1-based line number
    pub line_no: usize,
}

impl Line {
    /// Whether the line is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Line cursor shared by streaming reads and index-backed section reads.
///
/// Tracks byte offsets and line numbers, drops `#` comment lines and allows
/// one line of push-back so a parser can stop in front of the next section.
pub struct SectionCursor<R: BufRead> {
    reader: R,
    offset: u64,
    line_no: usize,
    pushed: Option<Line>,
    buffer: String,
}

impl<R: BufRead> SectionCursor<R> {
    /// Start a cursor at the beginning of `reader`
    pub fn new(reader: R) -> Self {
        Self::starting_at(reader, 0, 0)
    }

    /// Start a cursor whose first line sits at `offset`, after `line_no` lines
    pub fn starting_at(reader: R, offset: u64, line_no: usize) -> Self {
        Self {
            reader,
            offset,
            line_no,
            pushed: None,
            buffer: String::new(),
        }
    }

    /// Next non-comment line, or `None` at end of input
    pub fn next_line(&mut self) -> io::Result<Option<Line>> {
        if let Some(line) = self.pushed.take() {
            return Ok(Some(line));
        }
        loop {
            self.buffer.clear();
            let read = self.reader.read_line(&mut self.buffer)?;
            if read == 0 {
                return Ok(None);
            }
            let offset = self.offset;
            self.offset += read as u64;
            self.line_no += 1;

            let text = self.buffer.trim_end_matches(['\n', '\r']);
            if text.trim_start().starts_with('#') {
                continue;
            }
            return Ok(Some(Line {
                text: text.to_string(),
                offset,
                line_no: self.line_no,
            }));
        }
    }

    /// Next line that is not blank
    pub fn next_non_blank(&mut self) -> io::Result<Option<Line>> {
        while let Some(line) = self.next_line()? {
            if !line.is_blank() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Return a line so the next call to [`next_line`](Self::next_line) yields it again
    pub fn push_back(&mut self, line: Line) {
        self.pushed = Some(line);
    }

    /// Byte offset of the next line to be returned
    pub fn position(&self) -> u64 {
        self.pushed
            .as_ref()
            .map_or(self.offset, |line| line.offset)
    }

    /// Number of lines consumed so far
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_offsets_and_comments() {
        let text = "<mzSpecLib>\r\n# comment\nMS:1003186|library format version=1.0\n\n";
        let mut cursor = SectionCursor::new(Cursor::new(text));

        let first = cursor.next_line().unwrap().unwrap();
        assert_eq!(first.text, "<mzSpecLib>");
        assert_eq!(first.offset, 0);
        assert_eq!(first.line_no, 1);

        let second = cursor.next_line().unwrap().unwrap();
        assert_eq!(second.line_no, 3);
        assert_eq!(second.offset, 23);

        let blank = cursor.next_line().unwrap().unwrap();
        assert!(blank.is_blank());
        assert!(cursor.next_line().unwrap().is_none());
        assert_eq!(cursor.position(), text.len() as u64);
    }

    #[test]
    fn test_push_back() {
        let mut cursor = SectionCursor::new(Cursor::new("a\nb\n"));
        let a = cursor.next_line().unwrap().unwrap();
        cursor.push_back(a.clone());
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.next_line().unwrap(), Some(a));
        assert_eq!(cursor.next_line().unwrap().unwrap().text, "b");
    }
}
