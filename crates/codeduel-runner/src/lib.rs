pub mod comparator;
pub mod evaluator;
pub mod generator;
pub mod lang;
pub mod sandbox;
pub mod signature;
pub mod wrapper;

pub use comparator::{compare, TOLERANCE};
pub use evaluator::Evaluator;
pub use generator::{synthesize_input, HiddenTestGenerator};
pub use sandbox::{DockerSandbox, Sandbox, COMPILE_FAILED_MARKER};
pub use signature::extract as extract_signature;
pub use wrapper::wrap;
