//! Splits oversized sources at top-level definition boundaries so each
//! model request stays inside the configured token budget.

/// A contiguous slice of the source, tagged with the 1-based line it
/// starts on so reported lines can be mapped back to the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChunk {
    pub start_line: usize,
    pub text: String,
}

// The provider heuristic: roughly four bytes per token.
const BYTES_PER_TOKEN: usize = 4;

pub fn chunk_source(source: &str, token_budget: usize) -> Vec<SourceChunk> {
    let budget_bytes = token_budget.saturating_mul(BYTES_PER_TOKEN).max(1);
    if source.len() <= budget_bytes {
        return vec![SourceChunk {
            start_line: 1,
            text: source.to_string(),
        }];
    }

    let lines: Vec<&str> = source.lines().collect();
    let mut packer = Packer::new(budget_bytes);
    let mut block_start = 0;
    for boundary in 1..lines.len() {
        if is_block_boundary(lines[boundary]) {
            packer.add_block(block_start + 1, &lines[block_start..boundary]);
            block_start = boundary;
        }
    }
    packer.add_block(block_start + 1, &lines[block_start..]);
    packer.finish()
}

/// Top-level definitions and their decorators open a new block.
fn is_block_boundary(line: &str) -> bool {
    line.starts_with("def ")
        || line.starts_with("async def ")
        || line.starts_with("class ")
        || line.starts_with('@')
}

struct Packer {
    budget_bytes: usize,
    chunks: Vec<SourceChunk>,
    start_line: usize,
    buffer: String,
}

impl Packer {
    fn new(budget_bytes: usize) -> Self {
        Self {
            budget_bytes,
            chunks: Vec::new(),
            start_line: 1,
            buffer: String::new(),
        }
    }

    fn add_block(&mut self, start_line: usize, lines: &[&str]) {
        let block_len: usize = lines.iter().map(|l| l.len() + 1).sum();
        if block_len > self.budget_bytes {
            // A single oversized block gets split at line granularity.
            for (offset, line) in lines.iter().copied().enumerate() {
                self.add_lines(start_line + offset, &[line]);
            }
            return;
        }
        self.add_lines(start_line, lines);
    }

    fn add_lines(&mut self, start_line: usize, lines: &[&str]) {
        let added: usize = lines.iter().map(|l| l.len() + 1).sum();
        if !self.buffer.is_empty() && self.buffer.len() + added > self.budget_bytes {
            self.flush();
        }
        if self.buffer.is_empty() {
            self.start_line = start_line;
        }
        for line in lines {
            if !self.buffer.is_empty() {
                self.buffer.push('\n');
            }
            self.buffer.push_str(line);
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.chunks.push(SourceChunk {
            start_line: self.start_line,
            text: std::mem::take(&mut self.buffer),
        });
    }

    fn finish(mut self) -> Vec<SourceChunk> {
        self.flush();
        self.chunks
    }
}
