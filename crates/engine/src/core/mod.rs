pub mod finding;
pub mod result;
pub mod severity;
pub mod taxonomy;

pub use finding::{compare_findings, order_findings, Finding, FindingSource, Location, MergeSides};
pub use result::{ScanResult, ScanUnit, UnitIdentity};
pub use severity::Severity;
pub use taxonomy::{Category, SynonymMap};
