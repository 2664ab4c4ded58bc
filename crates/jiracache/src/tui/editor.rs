/// Single-line query input.
#[derive(Debug, Clone, Default)]
pub struct Editor {
    pub buffer: String,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn insert_char(&mut self, ch: char) {
        if !ch.is_control() {
            self.buffer.push(ch);
        }
    }

    /// Pasted text is flattened to one line.
    pub fn insert_str(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' | '\r' | '\t' => self.buffer.push(' '),
                _ => self.insert_char(ch),
            }
        }
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }
}
