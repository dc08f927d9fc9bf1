pub mod hit;
pub mod keys;
pub mod record;

pub use hit::{AuthEventView, IdentityView, LiveFields, RetrievalHit, StructuredHit, WorkItemView};
pub use record::{
	AuthEvent, DependencyLink, Identity, LinkDirection, Record, RecordKind, WorkItem,
};
