//! Content splitting for the build pipeline.
//!
//! Long content is split before embedding so no chunk exceeds the
//! provider's per-call limit. Splits prefer paragraph boundaries, then
//! line boundaries, and only fall back to a hard character cut when a
//! single line overruns the limit.

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Short input comes back as a single chunk. Empty and whitespace-only
/// input yields no chunks.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let max_chars = max_chars.max(1);
    if trimmed.chars().count() <= max_chars {
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in trimmed.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if para.chars().count() > max_chars {
            flush(&mut chunks, &mut current);
            split_long_block(para, max_chars, &mut chunks);
            continue;
        }
        let joined_len = current.chars().count() + 2 + para.chars().count();
        if !current.is_empty() && joined_len > max_chars {
            flush(&mut chunks, &mut current);
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }
    flush(&mut chunks, &mut current);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

/// A paragraph too big on its own: split by lines, then by characters.
fn split_long_block(block: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();
    for line in block.lines() {
        if line.chars().count() > max_chars {
            flush(chunks, &mut current);
            let mut buf = String::new();
            for ch in line.chars() {
                buf.push(ch);
                if buf.chars().count() == max_chars {
                    chunks.push(std::mem::take(&mut buf));
                }
            }
            if !buf.is_empty() {
                current = buf;
            }
            continue;
        }
        let joined_len = current.chars().count() + 1 + line.chars().count();
        if !current.is_empty() && joined_len > max_chars {
            flush(chunks, &mut current);
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    flush(chunks, &mut current);
}
