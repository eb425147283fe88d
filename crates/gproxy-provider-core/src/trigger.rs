//! Per-request trigger signal for the function-call middleware: a random marker injected into the prompt and expected to prefix
//! the model's XML tool-call block so the middleware can locate it
//! unambiguously. Lives in request context only — never persisted.

use rand::Rng;
use rand::distr::Alphanumeric;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSignal(String);

impl TriggerSignal {
    /// `<Function_{random}_Start/>`, matching the shape described above.
    pub fn generate() -> Self {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        Self(format!("<Function_{token}_Start/>"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_signal_has_expected_shape() {
        let sig = TriggerSignal::generate();
        assert!(sig.as_str().starts_with("<Function_"));
        assert!(sig.as_str().ends_with("_Start/>"));
    }
}
