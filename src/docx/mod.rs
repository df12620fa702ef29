//! Word document rendering: template package handling and custom properties.

mod properties;
mod renderer;

pub use properties::CustomProperties;
pub use renderer::DocxTemplate;
