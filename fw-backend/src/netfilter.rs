//! Netfilter/iptables target.
//!
//! Produces an `iptables-restore` document with three tables:
//!
//! - **filter**: default DROP policies, optional established/default/logging
//!   scaffolding, then every rule, policy and custom line in that order
//! - **mangle**: PREROUTING source validation built from `BIND` records, plus
//!   guards that stop NEW connections reaching a DNAT target directly
//! - **nat**: MASQUERADE, SNAT and DNAT rules derived from `ALLOW` records
//!
//! Rule placement depends on which endpoints are `LOCAL`: destination-only goes
//! to INPUT, source-only to OUTPUT, neither to FORWARD. Both-local rules are
//! rewritten onto the loopback network as an OUTPUT/INPUT pair.

use std::collections::HashMap;

use fw_ir::record::ANY_NETWORK;
use fw_ir::{
    pair_fields, policy_fields, rule_fields, Endpoint, HostToken, Keyword, NatTarget, Record,
    RuleFields,
};
use log::warn;

use crate::engine::{mirror, plan, yes_no, Generator, Mirror, TranslateError};
use crate::registry::TargetRegistration;

const LOOPBACK_NETWORK: &str = "127.0.0.0/8";

const BASIC_FILTER: &str = "*filter\n\
-P INPUT DROP\n\
-P FORWARD DROP\n\
-P OUTPUT DROP\n";

const BASIC_MANGLE: &str = "*mangle\n\
-P PREROUTING DROP\n";

const BASIC_NAT: &str = "*nat\n";

const COMMIT: &str = "COMMIT\n";

const MANGLE_LOOPBACK: &str = "-A PREROUTING -i lo -j ACCEPT\n";

const DEFAULT_ESTABLISHED: &str = "\
-A INPUT -m state --state ESTABLISHED,RELATED -j ACCEPT\n\
-A OUTPUT -m state --state ESTABLISHED,RELATED -j ACCEPT\n\
-A FORWARD -m state --state ESTABLISHED,RELATED -j ACCEPT\n";

const DEFAULT_FILTER: &str = "\
-A INPUT -i lo -j ACCEPT -m comment --comment \"loopback (default rules)\"\n\
-A INPUT -d 255.255.255.255 -j ACCEPT -m comment --comment \"broadcast (default r.)\"\n\
-A INPUT -d 224.0.0.0/4 -j ACCEPT -m comment --comment \"multicast (default r.)\"\n";

const DEFAULT_MANGLE: &str = "\
-A PREROUTING -m state --state INVALID,UNTRACKED -j DROP -m comment --comment \"inv. def.\"\n\
-A PREROUTING -d 255.255.255.255 -j ACCEPT -m comment --comment \"default r.\"\n\
-A PREROUTING -d 224.0.0.0/4 -j ACCEPT -m comment --comment \"default r.\"\n";

const LOGGING_FILTER: &str = "\
-N filter_drop\n\
-N filter_drop_icmp\n\
-A filter_drop_icmp -j LOG --log-prefix \"DROP-icmp \"\n\
-A filter_drop_icmp -j DROP\n\
-A filter_drop -p icmp -j filter_drop_icmp\n\
-N filter_drop_udp\n\
-A filter_drop_udp -j LOG --log-prefix \"DROP-udp \"\n\
-A filter_drop_udp -j DROP\n\
-A filter_drop -p udp -j filter_drop_udp\n\
-N filter_drop_tcp\n\
-A filter_drop_tcp -j LOG --log-prefix \"DROP-tcp \"\n\
-A filter_drop_tcp -j DROP\n\
-A filter_drop -p tcp -j filter_drop_tcp\n\
-A filter_drop -j LOG --log-prefix \"DROP-UNK \"\n\
-A filter_drop -j DROP\n\
-A INPUT -j filter_drop\n\
-A OUTPUT -j filter_drop\n\
-A FORWARD -j filter_drop\n";

const LOGGING_MANGLE: &str = "\
-N mangle_drop\n\
-N mangle_drop_icmp\n\
-A mangle_drop_icmp -j LOG --log-prefix \"MANGLE-DROP-ICMP \"\n\
-A mangle_drop_icmp -j DROP\n\
-A mangle_drop -p icmp -j mangle_drop_icmp\n\
-N mangle_drop_udp\n\
-A mangle_drop_udp -j LOG --log-prefix \"MANGLE-DROP-UDP \"\n\
-A mangle_drop_udp -j DROP\n\
-A mangle_drop -p udp -j mangle_drop_udp\n\
-N mangle_drop_tcp\n\
-A mangle_drop_tcp -j LOG --log-prefix \"MANGLE-DROP-TCP \"\n\
-A mangle_drop_tcp -j DROP\n\
-A mangle_drop -p tcp -j mangle_drop_tcp\n\
-A mangle_drop -j LOG --log-prefix \"MANGLE-DROP-UNK \"\n\
-A mangle_drop -j DROP\n\
-A PREROUTING -j mangle_drop\n";

/// Netfilter/iptables generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Netfilter;

inventory::submit! {
    TargetRegistration {
        id: "IPTABLES",
        description: "Standard Netfilter/iptables for Linux OS",
        build: || -> Box<dyn Generator> { Box::new(Netfilter) },
    }
}

impl Generator for Netfilter {
    fn language(&self) -> &'static str {
        "iptables"
    }

    fn translate(&self, configuration: &str) -> Result<String, TranslateError> {
        let plan = plan(configuration)?;
        let mut ctx = Context::new();

        for record in &plan.explicit {
            ctx.explicit(record)?;
        }
        for record in &plan.policies {
            let fields = policy_fields(&record.params)?.into_rule();
            ctx.rule(&record.keyword, &fields, &record.line);
        }
        for record in &plan.custom {
            ctx.filter.push_str(&record.params.join(";"));
            ctx.filter.push('\n');
        }

        Ok(ctx.finish())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Accept,
    Drop,
    Reject,
}

impl Verdict {
    fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Drop => "DROP",
            Self::Reject => "REJECT",
        }
    }
}

/// One endpoint of a generated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Side {
    host: HostToken,
    port: Option<String>,
}

impl Side {
    fn from_endpoint(endpoint: &Endpoint) -> Self {
        Self {
            host: endpoint.host_kind(),
            port: endpoint.port().map(str::to_string),
        }
    }

    fn is_local(&self) -> bool {
        self.host == HostToken::Local
    }
}

/// A filter rule before rendering. Roles are explicit so the reverse
/// direction is obtained by swapping sides.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterRule {
    source: Side,
    destination: Side,
    protocol: String,
    formula: String,
    verdict: Verdict,
    comment: String,
}

impl Mirror for FilterRule {
    fn mirrored(&self) -> Self {
        Self {
            source: self.destination.clone(),
            destination: self.source.clone(),
            ..self.clone()
        }
    }
}

impl FilterRule {
    fn chain(&self) -> &'static str {
        match (self.source.is_local(), self.destination.is_local()) {
            (false, true) => "INPUT",
            (true, false) => "OUTPUT",
            _ => "FORWARD",
        }
    }

    /// Both-local traffic expressed against the loopback network.
    fn via_loopback(&self) -> Self {
        let mut rule = self.clone();
        rule.destination.host = HostToken::Address(LOOPBACK_NETWORK.to_string());
        rule
    }

    /// Protocol comes first: iptables rejects `--sport`/`--dport` ahead of `-p`.
    fn matches(&self) -> String {
        let mut parts = vec![format!("-p {}", self.protocol)];
        match &self.source.host {
            HostToken::Address(addr) => parts.push(format!("-s {addr}")),
            HostToken::Interface(name) => parts.push(format!("-i {name}")),
            HostToken::Any | HostToken::Local => {}
        }
        if let Some(port) = &self.source.port {
            parts.push(format!("--sport {port}"));
        }
        match &self.destination.host {
            HostToken::Address(addr) => parts.push(format!("-d {addr}")),
            HostToken::Interface(name) => parts.push(format!("-o {name}")),
            HostToken::Any | HostToken::Local => {}
        }
        if let Some(port) = &self.destination.port {
            parts.push(format!("--dport {port}"));
        }
        parts.join(" ")
    }

    fn render(&self) -> String {
        let mut matches = self.matches();
        if !self.formula.is_empty() {
            matches.push(' ');
            matches.push_str(&self.formula);
        }
        format!(
            "-A {} {matches} -j {}{}",
            self.chain(),
            self.verdict.as_str(),
            comment(&self.comment)
        )
    }
}

fn comment(line: &str) -> String {
    format!(" -m comment --comment \"{}\"\n", line.replace('"', "'"))
}

/// State of one `translate` call.
struct Context {
    default_rules: bool,
    logging: bool,
    established: bool,
    /// Interface name to bound network, first binding wins.
    interfaces: HashMap<String, String>,
    /// Interfaces bound to any network, first-seen order.
    any_interfaces: Vec<String>,
    /// Networks every any-accepting interface must drop.
    any_drop_networks: Vec<String>,
    filter: String,
    nat: String,
    bindings: String,
    nat_mangle: String,
}

impl Context {
    fn new() -> Self {
        Self {
            default_rules: true,
            logging: true,
            established: false,
            interfaces: HashMap::new(),
            any_interfaces: Vec::new(),
            any_drop_networks: vec![LOOPBACK_NETWORK.to_string()],
            filter: String::new(),
            nat: String::new(),
            bindings: String::new(),
            nat_mangle: String::new(),
        }
    }

    fn explicit(&mut self, record: &Record) -> Result<(), TranslateError> {
        match &record.keyword {
            Keyword::Option => {
                let (name, value) = pair_fields(record, "OPTION")?;
                self.option(name, value);
            }
            Keyword::Bind => {
                let (interface, network) = pair_fields(record, "BIND")?;
                self.bind(interface, network, &record.line);
            }
            keyword if keyword.is_rule() => {
                let fields = rule_fields(&record.params)?;
                self.rule(keyword, &fields, &record.line);
            }
            other => warn!("unknown keyword {other}, ignoring: {}", record.line),
        }
        Ok(())
    }

    fn option(&mut self, name: &str, value: &str) {
        let flag = match name {
            "default_rules" => &mut self.default_rules,
            "logging" => &mut self.logging,
            "established" => &mut self.established,
            _ => {
                warn!("unknown option {name}");
                return;
            }
        };
        if let Some(value) = yes_no(name, value) {
            *flag = value;
        }
    }

    fn bind(&mut self, interface: &str, network: &str, line: &str) {
        if network == ANY_NETWORK {
            self.any_interfaces.push(interface.to_string());
        } else {
            self.bindings.push_str(&format!(
                "-A PREROUTING -i {interface} -s {network} -j ACCEPT{}",
                comment(line)
            ));
            self.any_drop_networks.push(network.to_string());
        }
        self.interfaces
            .entry(interface.to_string())
            .or_insert_with(|| network.to_string());
    }

    fn rule(&mut self, keyword: &Keyword, fields: &RuleFields, line: &str) {
        let (verdict, twoway) = match keyword {
            Keyword::Allow => (Verdict::Accept, false),
            Keyword::TwowayAllow => (Verdict::Accept, true),
            Keyword::Drop | Keyword::PolicyDrop => (Verdict::Drop, false),
            Keyword::Reject | Keyword::PolicyReject => (Verdict::Reject, false),
            _ => return,
        };
        if fields.source.is_localized() || fields.destination.is_localized() {
            warn!("interface localization is not supported by netfilter, ignoring it: {line}");
        }

        let rule = FilterRule {
            source: Side::from_endpoint(&fields.source),
            destination: Side::from_endpoint(&fields.destination),
            protocol: fields.protocol().unwrap_or_else(|| "all".to_string()),
            formula: fields.custom_formula.clone(),
            verdict,
            comment: line.to_string(),
        };

        if rule.source.is_local() && rule.destination.is_local() {
            let outbound = rule.via_loopback();
            self.filter.push_str(&outbound.render());
            self.filter.push_str(&mirror(&outbound).render());
        } else {
            self.filter.push_str(&rule.render());
            if twoway {
                self.filter.push_str(&mirror(&rule).render());
            }
        }

        if *keyword == Keyword::Allow {
            self.nat(&rule, fields);
        }
    }

    fn network_of(&self, interface: &str) -> Option<&str> {
        self.interfaces.get(interface).map(String::as_str)
    }

    /// Copy of `side` whose interface-shaped host is replaced by its bound network.
    fn resolved(&self, side: &Side, line: &str) -> Option<Side> {
        let HostToken::Interface(name) = &side.host else {
            return Some(side.clone());
        };
        let Some(network) = self.network_of(name) else {
            warn!("interface {name} has no bound network, skipping NAT for: {line}");
            return None;
        };
        Some(Side {
            host: HostToken::Address(network.to_string()),
            port: side.port.clone(),
        })
    }

    fn with_resolved_source(&self, rule: &FilterRule) -> Option<FilterRule> {
        let source = self.resolved(&rule.source, &rule.comment)?;
        Some(FilterRule {
            source,
            ..rule.clone()
        })
    }

    fn nat(&mut self, rule: &FilterRule, fields: &RuleFields) {
        match fields.source_nat.nat_kind() {
            NatTarget::None => self.destination_nat(rule, fields),
            NatTarget::Masquerade => {
                if let Some(rule) = self.with_resolved_source(rule) {
                    self.nat.push_str(&format!(
                        "-A POSTROUTING {} -j MASQUERADE{}",
                        rule.matches(),
                        comment(&rule.comment)
                    ));
                }
            }
            NatTarget::Address(addr) => {
                let to_source = match fields.source_nat.port() {
                    Some(port) => format!("{addr}:{port}"),
                    None => addr,
                };
                if let Some(rule) = self.with_resolved_source(rule) {
                    self.nat.push_str(&format!(
                        "-A POSTROUTING {} -j SNAT --to-source {to_source}{}",
                        rule.matches(),
                        comment(&rule.comment)
                    ));
                }
            }
            NatTarget::Interface(token) | NatTarget::Unsupported(token) => {
                warn!(
                    "source NAT to {token} needs a literal address, skipping NAT for: {}",
                    rule.comment
                );
            }
        }
    }

    fn destination_nat(&mut self, rule: &FilterRule, fields: &RuleFields) {
        let public = match fields.destination_nat.nat_kind() {
            NatTarget::None => return,
            NatTarget::Address(addr) => addr,
            NatTarget::Interface(name) => match self.network_of(&name) {
                Some(network) => network.to_string(),
                None => {
                    warn!(
                        "interface {name} has no bound network, skipping NAT for: {}",
                        rule.comment
                    );
                    return;
                }
            },
            NatTarget::Masquerade | NatTarget::Unsupported(_) => {
                warn!(
                    "unsupported destination NAT {}, skipping NAT for: {}",
                    fields.destination_nat.host, rule.comment
                );
                return;
            }
        };
        let Some(guarded) = self.resolved(&rule.destination, &rule.comment) else {
            return;
        };

        // New connections must not reach the translated host directly.
        let guard = FilterRule {
            destination: guarded,
            ..rule.clone()
        };
        self.nat_mangle.push_str(&format!(
            "-A PREROUTING {} -m state --state NEW -j DROP{}",
            guard.matches(),
            comment(&rule.comment)
        ));

        let HostToken::Address(internal) = &rule.destination.host else {
            warn!(
                "destination NAT needs a single internal host, skipping DNAT for: {}",
                rule.comment
            );
            return;
        };
        let to_destination = match &rule.destination.port {
            Some(port) => format!("{internal}:{port}"),
            None => internal.clone(),
        };

        let mut exposed = rule.clone();
        exposed.destination = Side {
            host: HostToken::Address(public),
            port: fields.destination_nat.port().map(str::to_string),
        };
        self.nat.push_str(&format!(
            "-A PREROUTING {} -j DNAT --to-destination {to_destination}{}",
            exposed.matches(),
            comment(&rule.comment)
        ));
    }

    fn finish(self) -> String {
        let mut bindings = self.bindings;
        for interface in &self.any_interfaces {
            let line = format!("BIND:{interface};{ANY_NETWORK}");
            let mut head = String::new();
            for network in &self.any_drop_networks {
                head.push_str(&format!(
                    "-A PREROUTING -i {interface} -s {network} -j DROP{}",
                    comment(&line)
                ));
            }
            head.push_str(&format!(
                "-A PREROUTING -i {interface} -j ACCEPT{}",
                comment(&line)
            ));
            bindings = head + &bindings;
        }

        let mut out = String::from(BASIC_FILTER);
        if self.established {
            out.push_str(DEFAULT_ESTABLISHED);
        }
        if self.default_rules {
            out.push_str(DEFAULT_FILTER);
        }
        out.push_str(&self.filter);
        if self.logging {
            out.push_str(LOGGING_FILTER);
        }
        out.push_str(COMMIT);

        out.push_str(BASIC_MANGLE);
        if self.default_rules {
            out.push_str(DEFAULT_MANGLE);
        }
        out.push_str(&self.nat_mangle);
        out.push_str(&bindings);
        out.push_str(MANGLE_LOOPBACK);
        if self.logging {
            out.push_str(LOGGING_MANGLE);
        }
        out.push_str(COMMIT);

        out.push_str(BASIC_NAT);
        out.push_str(&self.nat);
        out.push_str(COMMIT);
        out
    }
}
