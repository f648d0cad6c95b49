pub mod boundary;
pub mod session;
pub mod viewer;

pub use boundary::BoundaryStack;
pub use session::{NavigationParams, ViewSession};
pub use viewer::{LogViewer, ViewerError};
