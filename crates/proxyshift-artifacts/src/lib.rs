mod artifact;
mod checksum;
mod source;

pub use artifact::{Artifact, LinkOffset, LinkReferences};
pub use checksum::{bytecode_hash, verify_bytecode_hash};
pub use source::{ArtifactDirectory, ArtifactSource};
