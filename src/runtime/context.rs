use std::fmt;

/// Execution context handed to every statement; supplies the stream that
/// `print` writes to.
pub trait Context {
    fn output_stream(&mut self) -> &mut dyn fmt::Write;
}

/// Context accumulating everything written into an owned string.
///
/// Backs `str(...)` coercion, output capture in tests, and the driver.
#[derive(Debug, Default)]
pub struct DummyContext {
    pub output: String,
}

impl DummyContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Context for DummyContext {
    fn output_stream(&mut self) -> &mut dyn fmt::Write {
        &mut self.output
    }
}
