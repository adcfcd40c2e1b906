//! Host-side integration tests for the capture stream


#[cfg(test)]
mod wake_tests;
#[cfg(test)]
mod async_tests;
