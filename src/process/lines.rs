// src/process/lines.rs

/// Physical line numbers for a file the csv reader is walking.
///
/// The reader silently drops empty lines and reports positions that do not
/// count them, so lines are recounted here from byte offsets. `\n`, `\r\n`
/// and a lone `\r` each end one line.
pub struct LineIndex<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

/// What the reader consumed on one read: any empty lines it skipped, then
/// the line the record starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    pub blank_lines: Vec<usize>,
    pub record_line: usize,
}

impl<'a> LineIndex<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            line: 1,
        }
    }

    /// 1-based line of the byte at `offset`. Offsets must not go backwards.
    pub fn line_at(&mut self, offset: usize) -> usize {
        let end = offset.min(self.bytes.len());
        while self.pos < end {
            match self.bytes[self.pos] {
                b'\n' => self.line += 1,
                b'\r' if self.bytes.get(self.pos + 1) != Some(&b'\n') => self.line += 1,
                _ => {}
            }
            self.pos += 1;
        }
        self.line
    }

    /// Split the bytes consumed by one read, `start..end`, into the empty
    /// lines in front of the record and the record itself.
    pub fn gap(&mut self, start: usize, end: usize) -> Gap {
        let end = end.min(self.bytes.len());
        let mut pos = start;

        // a CRLF terminator leaves its `\n` for the next read
        if pos > 0 && pos < end && self.bytes[pos - 1] == b'\r' && self.bytes[pos] == b'\n' {
            pos += 1;
        }

        let mut blank_lines = Vec::new();
        while pos < end {
            match self.bytes[pos] {
                b'\r' => {
                    blank_lines.push(self.line_at(pos));
                    pos += if self.bytes.get(pos + 1) == Some(&b'\n') { 2 } else { 1 };
                }
                b'\n' => {
                    blank_lines.push(self.line_at(pos));
                    pos += 1;
                }
                _ => break,
            }
        }

        Gap {
            blank_lines,
            record_line: self.line_at(pos.min(end)),
        }
    }
}
