//! Shared functionality which is used in unit tests.
//!
//! [`fixtures`] builds small modules that carry aspect declarations, and [`emulator`] runs
//! the woven bodies so tests can check behavior instead of instruction shapes.


/// Routes `log` output of the code under test into the captured test output.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
