mod factory;
mod libraries;
mod types;

pub use factory::{build_factory, link_factory, BuiltFactory};
pub use libraries::{classify_libraries, resolve_libraries};
pub use types::{LibraryBindingSet, LibraryStatus, ResolvedLibraries};
