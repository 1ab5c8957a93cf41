// src/progress.rs
/// Lightweight progress reporting for extraction passes.
/// Front-ends (CLI, tests) implement this to see what a pass did.
pub trait Progress {
    /// Called at the start with the number of list items found.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line for human eyes.
    fn log(&mut self, _msg: &str) {}

    /// Called for each item that became part of the delta.
    fn item_done(&mut self, _id: &str) {}

    /// Called at the end, successful or not.
    fn finish(&mut self) {}
}
