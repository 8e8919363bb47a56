// Scrivener - request logging and crash reporting for async HTTP services
//
// Re-exports the middleware, formatter and sink types of scrivener-core and
// the stack dump pipeline of scrivener-stack under one crate.

// Re-export core functionality
pub use scrivener_core::*;

// Stack dump parsing and rendering
pub use scrivener_stack as stack;
pub use scrivener_stack::{Palette, ParseOptions, RenderOptions, Style, render_dump};

/// Prelude for convenient imports.
pub mod prelude {
    pub use scrivener_core::prelude::*;
    pub use scrivener_stack::{ColorWriter, Palette, Style};
}
