//! Target-agnostic translation engine.
//!
//! A [`Generator`] turns the text of one IR configuration into the text of one
//! target configuration. The [`Engine`] drives a generator over every numbered
//! input of a working directory and writes one artifact per configuration.
//!
//! ## Ordering
//!
//! Record order is the only ordering signal. [`plan`] splits a configuration
//! into three phases that every generator processes in turn: explicit records
//! (options, bindings, rules), then policies, then custom text. Policies thus
//! always land after every explicit rule and custom text after both, whatever
//! the generator.
//!
//! ## Failure policy
//!
//! Malformed IR and target-inexpressible rules are fatal for the whole run and
//! are detected before anything is written. Unreadable inputs and unwritable
//! outputs are skipped one at a time with a warning.

use std::path::PathBuf;

use fw_ir::{parse_configuration, write_artifact, ArtifactLayout, IrError, IrReader, Record};
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

/// Fatal translation failures.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Record(#[from] IrError),
    /// Target requires interface localization the record does not carry.
    #[error("{target} rules and policies must be localized on both endpoints: {line}")]
    Unlocalized { target: &'static str, line: String },
}

/// A run aborted before writing any artifact.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration {index} could not be translated: {source}")]
    Translate {
        index: usize,
        #[source]
        source: TranslateError,
    },
}

/// One code generator per enforcement target.
pub trait Generator: Send + Sync {
    /// Language tag used as the extension of generated artifacts.
    fn language(&self) -> &'static str;

    /// Translate one configuration. All derived state lives inside this call.
    fn translate(&self, configuration: &str) -> Result<String, TranslateError>;
}

/// Values that have a mirrored twin with source and destination roles swapped.
pub trait Mirror: Sized {
    fn mirrored(&self) -> Self;
}

/// Build the reverse-direction twin of a generated rule.
pub fn mirror<T: Mirror>(value: &T) -> T {
    value.mirrored()
}

/// Records of one configuration grouped into processing phases, each in input order.
#[derive(Debug, Default)]
pub struct RecordPlan {
    pub explicit: Vec<Record>,
    pub policies: Vec<Record>,
    pub custom: Vec<Record>,
}

/// Parse a configuration and group its records into phases.
pub fn plan(configuration: &str) -> Result<RecordPlan, IrError> {
    let mut plan = RecordPlan::default();
    for record in parse_configuration(configuration)? {
        if record.keyword.is_policy() {
            plan.policies.push(record);
        } else if record.keyword == fw_ir::Keyword::Custom {
            plan.custom.push(record);
        } else {
            plan.explicit.push(record);
        }
    }
    Ok(plan)
}

/// Interpret a `yes`/`no` option value, warning on anything else.
pub fn yes_no(name: &str, value: &str) -> Option<bool> {
    match value.trim() {
        "yes" => Some(true),
        "no" => Some(false),
        other => {
            warn!("value for option '{name}' not valid: {other}");
            None
        }
    }
}

/// What a run read and wrote.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub target: String,
    pub read: usize,
    pub written: usize,
    pub outputs: Vec<PathBuf>,
}

/// A generator bound to a working directory.
pub struct Engine {
    root: PathBuf,
    layout: ArtifactLayout,
    generator: Box<dyn Generator>,
}

impl Engine {
    pub fn new(root: impl Into<PathBuf>, generator: Box<dyn Generator>) -> Self {
        Self {
            root: root.into(),
            layout: ArtifactLayout::default(),
            generator,
        }
    }

    pub fn with_layout(mut self, layout: ArtifactLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn language(&self) -> &'static str {
        self.generator.language()
    }

    /// Read, translate and write every configuration under the root.
    ///
    /// The output directory must already exist.
    pub fn run(&self) -> Result<RunSummary, RunError> {
        let outcome = IrReader::new(&self.root, self.layout.clone()).read_all();

        let mut translated = Vec::with_capacity(outcome.count());
        for conf in &outcome.configurations {
            let text = self
                .generator
                .translate(&conf.text)
                .map_err(|source| RunError::Translate {
                    index: conf.index,
                    source,
                })?;
            translated.push((conf.index, text));
        }

        let language = self.language();
        let mut outputs = Vec::new();
        for (index, text) in translated {
            if text.is_empty() {
                continue;
            }
            match write_artifact(&self.layout, &self.root, index, language, &text) {
                Ok(path) => {
                    info!("wrote {}", path.display());
                    outputs.push(path);
                }
                Err(err) => warn!("skipping output file: {err}"),
            }
        }

        Ok(RunSummary {
            target: language.to_string(),
            read: outcome.count(),
            written: outputs.len(),
            outputs,
        })
    }
}
