//! Bridge between the inversion core and a browser-side renderer.
//!
//! Sample columns and a partial configuration come in as plain JS objects;
//! reports, quadratic roots and ensembles go back out the same way.

mod columns;
mod inversion;

pub use columns::SampleColumns;
pub use inversion::WasmInversion;
