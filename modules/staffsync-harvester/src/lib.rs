pub mod fetcher;
pub mod gate;
pub mod orchestrator;
pub mod parse;
pub mod reconciler;
pub mod resolver;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
