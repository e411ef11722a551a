/*!
 * The coded-text data model.
 *
 * - `markers`: marker chars and tag keys
 * - `tag`: code and annotation tags
 * - `metadata`: annotation kinds and payloads
 * - `store`: per-side tag tables and the unit store
 * - `fragment`: coded text and its mutations
 * - `part`, `unit`: containers grouping fragments
 */

pub mod fragment;
pub mod markers;
pub mod metadata;
pub mod part;
pub mod store;
pub mod tag;
pub mod unit;

pub use fragment::{Content, Fragment, FragmentEditor};
pub use markers::{MarkerClass, TagKey};
pub use metadata::{AnnotationKind, Metadata};
pub use part::{GetTarget, Part, PartKind, TargetState};
pub use store::{DataRefMap, Side, Store, Tags};
pub use tag::{CTag, CanReorder, CodeType, Directionality, MTag, ProtectedContent, Tag, TagType};
pub use unit::{AnnotatedSpan, Note, Unit, UnitObject};
