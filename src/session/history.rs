use crate::reading::Reading;

/// Every accepted reading of a session, in arrival order. Append-only.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    readings: Vec<Reading>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn last(&self) -> Option<&Reading> {
        self.readings.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> + '_ {
        self.readings.iter()
    }

    /// One literal-list line per reading, the same form the instrument sends.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for reading in &self.readings {
            out.push_str(&reading.to_string());
            out.push('\n');
        }
        out
    }
}
