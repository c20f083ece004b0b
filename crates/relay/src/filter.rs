//! Line filter for the relayed terminal stream

/// Suppresses lines starting with a fixed tag prefix from a byte stream,
/// forwarding everything else as soon as possible.
///
/// Output only needs buffering while the start of a line could still turn
/// out to be the tag prefix; the moment it diverges, the held bytes are
/// released. Carriage returns count as line boundaries so in-place
/// progress updates flow through without waiting for a newline.
#[derive(Debug)]
pub struct TagFilter {
    prefix: Vec<u8>,
    held: Vec<u8>,
    mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// At a line boundary, matching against the prefix
    LineStart,
    /// Mid-line, known not to be a tag line
    Pass,
    /// Mid-line on a tag line, discarding until newline
    Drop,
}

impl TagFilter {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.as_bytes().to_vec(),
            held: Vec::new(),
            mode: Mode::LineStart,
        }
    }

    /// Feed a chunk, returning the bytes to forward
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len());
        for &byte in chunk {
            match self.mode {
                Mode::Drop => {
                    if byte == b'\n' {
                        self.mode = Mode::LineStart;
                    }
                }
                Mode::Pass => {
                    out.push(byte);
                    if byte == b'\n' || byte == b'\r' {
                        self.mode = Mode::LineStart;
                    }
                }
                Mode::LineStart => {
                    if byte == b'\n' || byte == b'\r' {
                        // Line ended before the prefix could complete
                        out.append(&mut self.held);
                        out.push(byte);
                    } else {
                        self.held.push(byte);
                        if self.prefix.starts_with(&self.held) {
                            if self.held.len() == self.prefix.len() {
                                self.held.clear();
                                self.mode = Mode::Drop;
                            }
                        } else {
                            out.append(&mut self.held);
                            self.mode = Mode::Pass;
                        }
                    }
                }
            }
        }
        out
    }

    /// Release anything still held at end of stream
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(prefix: &str, chunks: &[&[u8]]) -> Vec<u8> {
        let mut filter = TagFilter::new(prefix);
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(filter.push(chunk));
        }
        out.extend(filter.flush());
        out
    }

    #[test]
    fn test_plain_lines_pass_through() {
        assert_eq!(
            run("rapt:", &[b"Unpacking curl...\nSetting up curl...\n"]),
            b"Unpacking curl...\nSetting up curl...\n"
        );
    }

    #[test]
    fn test_tag_lines_are_suppressed() {
        assert_eq!(
            run(
                "rapt:",
                &[b"rapt:install-list:curl\nUnpacking curl...\nrapt:status:install:1\n"]
            ),
            b"Unpacking curl...\n"
        );
    }

    #[test]
    fn test_prefix_split_across_chunks() {
        assert_eq!(
            run("rapt:", &[b"ra", b"pt:status:x\nok\n"]),
            b"ok\n"
        );
    }

    #[test]
    fn test_line_that_diverges_from_prefix() {
        assert_eq!(run("rapt:", &[b"rapture ahead\n"]), b"rapture ahead\n");
    }

    #[test]
    fn test_carriage_return_progress_flows_through() {
        assert_eq!(
            run("rapt:", &[b"Progress: 50%\rProgress: 51%\r"]),
            b"Progress: 50%\rProgress: 51%\r"
        );
    }

    #[test]
    fn test_tag_after_carriage_return_is_suppressed() {
        assert_eq!(
            run("rapt:", &[b"Progress: 99%\rrapt:status:install:1\ndone\n"]),
            b"Progress: 99%\rdone\n"
        );
    }

    #[test]
    fn test_partial_line_released_at_eof() {
        assert_eq!(run("rapt:", &[b"rap"]), b"rap");
    }

    #[test]
    fn test_short_line_shorter_than_prefix() {
        assert_eq!(run("rapt:", &[b"ok\n"]), b"ok\n");
    }
}
