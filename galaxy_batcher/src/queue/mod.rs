/// Queue module - render passes and frame submission

pub mod render_pass;
pub mod render_queue;

pub use render_pass::*;
pub use render_queue::*;
