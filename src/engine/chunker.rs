//! Document chunking for bulk corpus ingestion.

/// Splits a document into corpus chunk texts.
pub trait DocumentChunker: Send + Sync {
    /// Split `text` into chunks, in document order. Empty chunks are dropped.
    fn chunk(&self, text: &str) -> Vec<String>;
}

/// Splits on blank lines. Paragraphs longer than `max_chars` are split
/// further at whitespace.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphChunker {
    pub max_chars: usize,
}

impl ParagraphChunker {
    /// Create a chunker with the given paragraph size cap.
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::new(2_000)
    }
}

impl DocumentChunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut paragraph: Vec<&str> = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                self.flush(&mut paragraph, &mut chunks);
            } else {
                paragraph.push(line.trim());
            }
        }
        self.flush(&mut paragraph, &mut chunks);
        chunks
    }
}

impl ParagraphChunker {
    fn flush(&self, paragraph: &mut Vec<&str>, chunks: &mut Vec<String>) {
        if paragraph.is_empty() {
            return;
        }
        let joined = paragraph.join(" ");
        paragraph.clear();

        if joined.chars().count() <= self.max_chars {
            chunks.push(joined);
            return;
        }

        let mut current = String::new();
        for word in joined.split_whitespace() {
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > self.max_chars && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
    }
}
