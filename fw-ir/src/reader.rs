//! Enumeration of numbered IR input files.
//!
//! Inputs are numbered contiguously from 0. Enumeration stops at the first
//! index with no regular file, even when higher indices are present.
//! A file that exists but cannot be read is skipped with a warning and the
//! scan moves on to the next index.

use std::fs;
use std::path::PathBuf;

use log::{info, warn};

use crate::layout::ArtifactLayout;

/// Text of one IR configuration and the index it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub index: usize,
    pub text: String,
}

/// Reader over `<root>/<input_dir>/<prefix><i>.<suffix>` files.
#[derive(Debug, Clone)]
pub struct IrReader {
    root: PathBuf,
    layout: ArtifactLayout,
}

impl IrReader {
    pub fn new(root: impl Into<PathBuf>, layout: ArtifactLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    /// Lazy pass over the inputs. Every call starts again from index 0.
    pub fn iter(&self) -> Configurations<'_> {
        Configurations {
            reader: self,
            next: 0,
            done: false,
        }
    }

    /// Read every available configuration in index order.
    pub fn read_all(&self) -> ReadOutcome {
        let configurations: Vec<Configuration> = self.iter().collect();
        info!("successfully read {} files", configurations.len());
        ReadOutcome { configurations }
    }
}

/// Result of a full scan.
#[derive(Debug, Clone, Default)]
pub struct ReadOutcome {
    pub configurations: Vec<Configuration>,
}

impl ReadOutcome {
    pub fn count(&self) -> usize {
        self.configurations.len()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.configurations
            .iter()
            .map(|conf| conf.text.as_str())
            .collect()
    }
}

/// Iterator returned by [`IrReader::iter`].
#[derive(Debug)]
pub struct Configurations<'a> {
    reader: &'a IrReader,
    next: usize,
    done: bool,
}

impl Iterator for Configurations<'_> {
    type Item = Configuration;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let index = self.next;
            let path = self.reader.layout.input_path(&self.reader.root, index);
            if !path.is_file() {
                self.done = true;
                break;
            }
            self.next += 1;

            match fs::read_to_string(&path) {
                Ok(text) => return Some(Configuration { index, text }),
                Err(err) => {
                    warn!(
                        "skipping input file {} since it isn't readable: {err}",
                        path.display()
                    );
                }
            }
        }
        None
    }
}
