//! Line-aware splitting of outbound text that exceeds a platform limit.

/// Split `text` into ordered chunks of at most `max_len` characters.
///
/// Lines are kept whole when they fit; a line longer than `max_len` is broken
/// at spaces, and a single word longer than `max_len` is cut hard.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut builder = ChunkBuilder::new(max_len);
    for line in text.split('\n') {
        if char_len(line) > max_len {
            for run in word_runs(line, max_len) {
                builder.push_line(&run);
            }
        } else {
            builder.push_line(line);
        }
    }
    builder.finish()
}

struct ChunkBuilder {
    max_len: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
}

impl ChunkBuilder {
    fn new(max_len: usize) -> Self {
        Self {
            max_len,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
        }
    }

    fn push_line(&mut self, line: &str) {
        let line_len = char_len(line);
        if self.current_len + line_len + 1 > self.max_len {
            self.flush();
        }
        self.current.push_str(line);
        self.current.push('\n');
        self.current_len += line_len + 1;
    }

    fn flush(&mut self) {
        let trimmed = self.current.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_string());
        }
        self.current.clear();
        self.current_len = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

fn word_runs(line: &str, max_len: usize) -> Vec<String> {
    let mut runs = Vec::new();
    let mut run = String::new();
    let mut run_len = 0;

    for word in line.split(' ') {
        for piece in hard_pieces(word, max_len) {
            let piece_len = char_len(&piece);
            let sep = usize::from(run_len > 0);
            if run_len + sep + piece_len > max_len {
                runs.push(std::mem::take(&mut run));
                run_len = 0;
            }
            if run_len > 0 {
                run.push(' ');
                run_len += 1;
            }
            run.push_str(&piece);
            run_len += piece_len;
        }
    }
    if !run.is_empty() {
        runs.push(run);
    }
    runs
}

fn hard_pieces(word: &str, max_len: usize) -> Vec<String> {
    if char_len(word) <= max_len {
        return vec![word.to_string()];
    }
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_len)
        .map(|piece| piece.iter().collect())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::split_message;

    #[test]
    fn short_text_is_returned_unchanged() {
        let chunks = split_message("hola\nmundo", 4000);
        assert_eq!(chunks, vec!["hola\nmundo".to_string()]);
    }

    #[test]
    fn long_text_splits_on_line_boundaries() {
        let line = "x".repeat(30);
        let text = vec![line.clone(); 10].join("\n");
        let chunks = split_message(&text, 100);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
            assert!(chunk.split('\n').all(|l| l == line), "lines must stay whole");
        }
        let total_lines: usize = chunks.iter().map(|c| c.split('\n').count()).sum();
        assert_eq!(total_lines, 10);
    }

    #[test]
    fn overlong_line_falls_back_to_word_boundaries() {
        let words: Vec<String> = (0..40).map(|i| format!("palabra{i:02}")).collect();
        let text = words.join(" ");
        let chunks = split_message(&text, 50);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        assert_eq!(rejoined, words.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn single_overlong_word_is_cut_hard() {
        let text = "a".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks, vec!["a".repeat(10), "a".repeat(10), "a".repeat(5)]);
    }

    #[test]
    fn lengths_are_counted_in_characters() {
        let text = "ñ".repeat(8);
        assert_eq!(split_message(&text, 8), vec![text.clone()]);
    }
}
