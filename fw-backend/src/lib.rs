//! Firewall IR back end: netfilter/iptables and JunOS code generation.
//!
//! # Architecture
//!
//! - [`engine`]: the [`Generator`](engine::Generator) trait, structural
//!   mirroring of two-way rules, record phase planning, and the
//!   read/translate/write pipeline ([`Engine`](engine::Engine))
//! - [`netfilter`]: `iptables-restore` output (filter, mangle and nat tables)
//! - [`junos`]: JunOS `set` command scripts (filters, zones, policies, NAT)
//! - [`registry`]: self-registered targets, looked up by id
//! - [`layout_config`]: TOML loading of input/output artifact naming
//!
//! IR parsing and file enumeration live in the `fw-ir` crate.
//!
//! # Examples
//!
//! ```ignore
//! use fw_backend::engine::Generator;
//! use fw_backend::netfilter::Netfilter;
//!
//! let rules = Netfilter.translate("ALLOW:n-10.0.0.1;;0;;;0;n-10.0.0.2;;443;;;0;TCP;\n")?;
//! assert!(rules.contains("-A FORWARD -p tcp -s 10.0.0.1 -d 10.0.0.2 --dport 443 -j ACCEPT"));
//! ```

pub mod engine;
pub mod junos;
pub mod layout_config;
pub mod netfilter;
pub mod registry;
