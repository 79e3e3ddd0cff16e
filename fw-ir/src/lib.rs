//! Intermediate representation shared by every firewall target generator.
//!
//! An IR configuration is a sequence of lines of the form
//! `KEYWORD:param;param;...`. This crate knows how to load numbered IR files,
//! split them into [`Record`]s, group rule and policy parameters into their
//! semantic fields, and write generated artifacts back. It has no knowledge of
//! any enforcement target.

pub mod layout;
pub mod parser;
pub mod reader;
pub mod record;
pub mod writer;

pub use layout::ArtifactLayout;
pub use parser::{
    pair_fields, parse_configuration, parse_record, policy_fields, rule_fields, IrError,
    POLICY_ARITY, RULE_ARITY,
};
pub use reader::{Configuration, IrReader, ReadOutcome};
pub use record::{Endpoint, HostToken, Keyword, NatTarget, PolicyFields, Record, RuleFields};
pub use writer::{write_artifact, WriteError};
