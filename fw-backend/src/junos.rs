//! Juniper JunOS target.
//!
//! Emits a `set`/`delete` command script. Every rule becomes a pair of
//! per-interface firewall filters (an input filter on the source interface and
//! an output filter on the destination interface); policies become zone-based
//! security policies matching on address-book names. Both endpoints of every
//! rule and policy must be localized on an interface.
//!
//! Interface names arrive as `xx_n_m_i` and are rendered `xx-n/m/i`.

use fw_ir::{
    pair_fields, policy_fields, rule_fields, Endpoint, HostToken, Keyword, NatTarget, Record,
    RuleFields,
};
use log::warn;

use crate::engine::{mirror, plan, Generator, Mirror, TranslateError};
use crate::registry::TargetRegistration;

const TARGET: &str = "JunOS";
const ANY_ADDRESS: &str = "0.0.0.0/0";

/// JunOS generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Junos;

inventory::submit! {
    TargetRegistration {
        id: "JUNOS",
        description: "Juniper JunOS command script (beta)",
        build: || -> Box<dyn Generator> { Box::new(Junos) },
    }
}

impl Generator for Junos {
    fn language(&self) -> &'static str {
        "junos"
    }

    fn translate(&self, configuration: &str) -> Result<String, TranslateError> {
        warn!("JunOS support is still in beta; check the commands before loading them on a device");

        let plan = plan(configuration)?;
        let mut ctx = Context::default();

        for record in &plan.explicit {
            ctx.explicit(record)?;
        }
        for record in &plan.policies {
            ctx.policy(record)?;
        }
        for record in &plan.custom {
            ctx.rules.push_str(&record.params.join(";"));
            ctx.rules.push('\n');
        }

        Ok(ctx.finish())
    }
}

/// `xx_n_m_i` to `xx-n/m/i`. Names without underscores are kept as written.
pub fn device_name(interface: &str) -> String {
    let parts: Vec<&str> = interface.split('_').collect();
    match parts.split_first() {
        Some((kind, rest)) if !rest.is_empty() => format!("{kind}-{}", rest.join("/")),
        _ => interface.to_string(),
    }
}

/// `IP_a_b_c_d` to `a.b.c.d`.
fn static_route_address(value: &str) -> Option<String> {
    match value.strip_prefix("IP_") {
        Some(rest) if value.len() >= 10 => Some(rest.replace('_', ".")),
        _ => {
            warn!("illegal value for static_route option: {value}");
            None
        }
    }
}

/// Filter/NAT address of a host token. Wildcards map to `any`.
fn filter_address(endpoint: &Endpoint, line: &str) -> String {
    match endpoint.host_kind() {
        HostToken::Address(addr) if addr != ANY_ADDRESS => addr,
        HostToken::Address(_) | HostToken::Any => "any".to_string(),
        HostToken::Local | HostToken::Interface(_) => {
            warn!(
                "host {} cannot be matched by address on JunOS, using any: {line}",
                endpoint.host
            );
            "any".to_string()
        }
    }
}

fn nat_address(endpoint: &Endpoint) -> String {
    match endpoint.host_kind() {
        HostToken::Address(addr) => addr,
        _ => ANY_ADDRESS.to_string(),
    }
}

fn pool_port(endpoint: &Endpoint) -> &str {
    endpoint.port().unwrap_or("no-translation")
}

#[derive(Debug, Default)]
struct Counter {
    next: usize,
}

impl Counter {
    fn name(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.next);
        self.next += 1;
        name
    }
}

/// Literal address to synthetic name, first-seen order, never re-keyed.
#[derive(Debug)]
struct AddressBook {
    entries: Vec<(String, String)>,
    counter: Counter,
}

impl Default for AddressBook {
    fn default() -> Self {
        Self {
            entries: vec![(ANY_ADDRESS.to_string(), "any".to_string())],
            counter: Counter::default(),
        }
    }
}

impl AddressBook {
    /// Name for `address` and whether it was allocated by this call.
    fn entry(&mut self, address: &str) -> (String, bool) {
        if let Some((_, name)) = self.entries.iter().find(|(addr, _)| addr == address) {
            return (name.clone(), false);
        }
        let name = self.counter.name("ep");
        self.entries.push((address.to_string(), name.clone()));
        (name, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortRole {
    Source,
    Destination,
}

impl PortRole {
    fn flipped(self) -> Self {
        match self {
            Self::Source => Self::Destination,
            Self::Destination => Self::Source,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source-port",
            Self::Destination => "destination-port",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    filter: String,
    address: String,
    port: Option<(PortRole, String)>,
    protocol: Option<String>,
}

impl Term {
    fn render(&self, address_match: &str, action: &str) -> String {
        let prefix = format!("set firewall family inet filter {} term 0", self.filter);
        let mut out = format!("{prefix} from {address_match} {}\n", self.address);
        if let Some((role, port)) = &self.port {
            out.push_str(&format!("{prefix} from {} {port}\n", role.as_str()));
        }
        if let Some(protocol) = &self.protocol {
            out.push_str(&format!("{prefix} from protocol {protocol}\n"));
        }
        out.push_str(&format!("{prefix} then {action}\n"));
        out
    }
}

/// Input filter for the source interface and output filter for the destination interface.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterPair {
    input: Term,
    output: Term,
    action: &'static str,
}

impl Mirror for FilterPair {
    fn mirrored(&self) -> Self {
        let flip = |port: &Option<(PortRole, String)>| {
            port.as_ref()
                .map(|(role, value)| (role.flipped(), value.clone()))
        };
        Self {
            input: Term {
                address: self.output.address.clone(),
                port: flip(&self.input.port),
                ..self.input.clone()
            },
            output: Term {
                address: self.input.address.clone(),
                port: flip(&self.output.port),
                ..self.output.clone()
            },
            action: self.action,
        }
    }
}

impl FilterPair {
    fn renamed(mut self, input: String, output: String) -> Self {
        self.input.filter = input;
        self.output.filter = output;
        self
    }

    fn render(&self) -> String {
        self.input.render("source-address", self.action)
            + &self.output.render("destination-address", self.action)
    }
}

#[derive(Debug, Default)]
struct Context {
    static_route: String,
    reset_interfaces: String,
    bindings: String,
    zones: String,
    address_book_decls: String,
    policies: String,
    rules: String,
    nat: String,
    pools: String,
    address_book: AddressBook,
    policy_names: Counter,
    input_filters: Counter,
    output_filters: Counter,
    rule_sets: Counter,
    pool_names: Counter,
}

impl Context {
    fn explicit(&mut self, record: &Record) -> Result<(), TranslateError> {
        match &record.keyword {
            Keyword::Option => {
                let (name, value) = pair_fields(record, "OPTION")?;
                if name == "static_route" {
                    if let Some(ip) = static_route_address(value) {
                        self.static_route =
                            format!("set routing-options static route 0.0.0.0/0 next-hop {ip}\n");
                    }
                } else {
                    warn!("unknown option {name}");
                }
            }
            Keyword::Bind => {
                let (interface, network) = pair_fields(record, "BIND")?;
                let device = device_name(interface);
                self.reset_interfaces
                    .push_str(&format!("delete interfaces {device}\n"));
                self.bindings.push_str(&format!(
                    "set interfaces {device} unit 0 family inet address {network}\n"
                ));
                self.zones.push_str(&format!(
                    "set security zones security-zone {interface} interfaces {device}.0\n"
                ));
            }
            keyword if keyword.is_rule() => {
                let fields = rule_fields(&record.params)?;
                self.rule(keyword, &fields, &record.line)?;
            }
            other => warn!("unknown keyword {other}, ignoring: {}", record.line),
        }
        Ok(())
    }

    fn rule(
        &mut self,
        keyword: &Keyword,
        fields: &RuleFields,
        line: &str,
    ) -> Result<(), TranslateError> {
        if !fields.source.is_localized() || !fields.destination.is_localized() {
            return Err(TranslateError::Unlocalized {
                target: TARGET,
                line: line.to_string(),
            });
        }
        let action = match keyword {
            Keyword::Drop => "discard",
            Keyword::Reject => "reject",
            _ => "accept",
        };
        let input_interface = device_name(&fields.source.interface);
        let output_interface = device_name(&fields.destination.interface);
        let protocol = fields.protocol();

        let forward = FilterPair {
            input: Term {
                filter: self.input_filters.name("ri"),
                address: filter_address(&fields.source, line),
                port: fields
                    .source
                    .port()
                    .map(|p| (PortRole::Source, p.to_string())),
                protocol: protocol.clone(),
            },
            output: Term {
                filter: self.output_filters.name("ro"),
                address: filter_address(&fields.destination, line),
                port: fields
                    .destination
                    .port()
                    .map(|p| (PortRole::Destination, p.to_string())),
                protocol,
            },
            action,
        };
        self.rules.push_str(&forward.render());
        self.bind_filters(&input_interface, &output_interface, &forward);

        if *keyword == Keyword::TwowayAllow {
            let input = self.input_filters.name("ri");
            let output = self.output_filters.name("ro");
            let reverse = mirror(&forward).renamed(input, output);
            self.rules.push_str(&reverse.render());
            self.bind_filters(&output_interface, &input_interface, &reverse);
        }

        if *keyword == Keyword::Allow {
            self.nat(fields, line);
        }
        Ok(())
    }

    fn bind_filters(&mut self, input_interface: &str, output_interface: &str, pair: &FilterPair) {
        self.bindings.push_str(&format!(
            "set interfaces {input_interface} unit 0 family inet filter input-list {}\n",
            pair.input.filter
        ));
        self.bindings.push_str(&format!(
            "set interfaces {output_interface} unit 0 family inet filter output-list {}\n",
            pair.output.filter
        ));
    }

    fn nat(&mut self, fields: &RuleFields, line: &str) {
        let from_zone = &fields.source.interface;
        let to_zone = &fields.destination.interface;
        let source_nat = match fields.source_nat.nat_kind() {
            NatTarget::None => None,
            NatTarget::Masquerade => Some("interface".to_string()),
            NatTarget::Address(addr) => {
                let pool = self.pool_names.name("pool");
                self.pools.push_str(&format!(
                    "set security nat source pool {pool} address {addr}\n\
                     set security nat source pool {pool} port {}\n",
                    pool_port(&fields.source_nat)
                ));
                Some(format!("pool {pool}"))
            }
            NatTarget::Interface(token) | NatTarget::Unsupported(token) => {
                warn!("source NAT to {token} needs a literal address, skipping NAT for: {line}");
                return;
            }
        };

        if let Some(translation) = source_nat {
            let set = self.rule_sets.name("rs");
            let rule_name = if translation == "interface" {
                "masquerade"
            } else {
                "source-nat"
            };
            let prefix = format!("set security nat source rule-set {set}");
            self.nat.push_str(&format!(
                "{prefix} from zone {from_zone}\n\
                 {prefix} to zone {to_zone}\n\
                 {prefix} rule {rule_name} match source-address {}\n\
                 {prefix} rule {rule_name} match destination-address {}\n\
                 {prefix} rule {rule_name} then source-nat {translation}\n",
                nat_address(&fields.source),
                nat_address(&fields.destination),
            ));
            return;
        }

        let public = match fields.destination_nat.nat_kind() {
            NatTarget::None => return,
            NatTarget::Address(addr) => addr,
            _ => {
                warn!(
                    "unsupported destination NAT {}, skipping NAT for: {line}",
                    fields.destination_nat.host
                );
                return;
            }
        };
        let HostToken::Address(internal) = fields.destination.host_kind() else {
            warn!("destination NAT needs a literal destination address, skipping NAT for: {line}");
            return;
        };

        let pool = self.pool_names.name("pool");
        let set = self.rule_sets.name("rs");
        self.pools.push_str(&format!(
            "set security nat destination pool {pool} address {internal}\n\
             set security nat destination pool {pool} port {}\n",
            pool_port(&fields.destination)
        ));
        let prefix = format!("set security nat destination rule-set {set}");
        self.nat.push_str(&format!(
            "{prefix} from zone {from_zone}\n\
             {prefix} rule destination-nat match destination-address {public}\n"
        ));
        if let Some(port) = fields.destination_nat.port() {
            self.nat.push_str(&format!(
                "{prefix} rule destination-nat match destination-port {port}\n"
            ));
        }
        self.nat.push_str(&format!(
            "{prefix} rule destination-nat then destination-nat pool {pool}\n"
        ));
    }

    fn policy(&mut self, record: &Record) -> Result<(), TranslateError> {
        let fields = policy_fields(&record.params)?;
        if !fields.source.is_localized() || !fields.destination.is_localized() {
            return Err(TranslateError::Unlocalized {
                target: TARGET,
                line: record.line.clone(),
            });
        }
        let from_zone = fields.source.interface.clone();
        let to_zone = fields.destination.interface.clone();

        let source = self.address_entry(&fields.source, &record.line);
        let destination = self.address_entry(&fields.destination, &record.line);
        let name = self.policy_names.name("pr");
        let prefix =
            format!("set security policies from-zone {from_zone} to-zone {to_zone} policy {name}");

        let mut out = format!("{prefix} match source-address {source}\n");
        if let Some(port) = fields.source.port() {
            out.push_str(&format!("{prefix} match source-port {port}\n"));
        }
        out.push_str(&format!("{prefix} match destination-address {destination}\n"));
        if let Some(port) = fields.destination.port() {
            out.push_str(&format!("{prefix} match destination-port {port}\n"));
        }
        if let Some(protocol) = fields.protocol() {
            out.push_str(&format!("{prefix} match protocol {protocol}\n"));
        }
        let action = if record.keyword == Keyword::PolicyDrop {
            "discard"
        } else {
            "reject"
        };
        out.push_str(&format!("{prefix} then {action}\n"));
        self.policies.push_str(&out);
        Ok(())
    }

    /// Address-book name for a policy endpoint, declaring it on first sight.
    fn address_entry(&mut self, endpoint: &Endpoint, line: &str) -> String {
        let address = match endpoint.host_kind() {
            HostToken::Address(addr) => addr,
            HostToken::Any => ANY_ADDRESS.to_string(),
            HostToken::Local | HostToken::Interface(_) => {
                warn!(
                    "host {} cannot be matched by address on JunOS, using any: {line}",
                    endpoint.host
                );
                ANY_ADDRESS.to_string()
            }
        };
        let (name, fresh) = self.address_book.entry(&address);
        if fresh {
            self.address_book_decls.push_str(&format!(
                "set security zones security-zone {} address-book address {name} {address}\n",
                endpoint.interface
            ));
        }
        name
    }

    fn finish(self) -> String {
        [
            self.rules,
            self.reset_interfaces,
            self.bindings,
            self.static_route,
            self.zones,
            self.address_book_decls,
            "delete security policies\n".to_string(),
            self.policies,
            "delete security nat\n".to_string(),
            self.pools,
            self.nat,
            "commit\n".to_string(),
        ]
        .concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn translate(text: &str) -> String {
        Junos.translate(text).expect("translate")
    }

    #[test]
    fn converts_interface_names() {
        assert_eq!(device_name("ge_0_0_1"), "ge-0/0/1");
        assert_eq!(device_name("lo"), "lo");
    }

    #[test]
    fn static_route_requires_ip_prefix() {
        assert_eq!(
            static_route_address("IP_10_0_0_1"),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(static_route_address("10.0.0.1"), None);
        assert_eq!(static_route_address("IP_1_1"), None);
    }

    #[test]
    fn blank_input_yields_scaffold_only() {
        assert_eq!(
            translate("\n\n"),
            "delete security policies\ndelete security nat\ncommit\n"
        );
    }

    #[test]
    fn bind_emits_interface_and_zone() {
        let out = translate("BIND:ge_0_0_1;10.0.0.1/24\n");
        assert_eq!(
            out,
            "delete interfaces ge-0/0/1\n\
             set interfaces ge-0/0/1 unit 0 family inet address 10.0.0.1/24\n\
             set security zones security-zone ge_0_0_1 interfaces ge-0/0/1.0\n\
             delete security policies\n\
             delete security nat\n\
             commit\n"
        );
    }

    #[test]
    fn rule_emits_input_and_output_filters() {
        let out = translate("ALLOW:n-10.0.0.0/24;ge_0_0_1;1024;;;0;n-0.0.0.0/0;ge_0_0_2;80;;;0;TCP;\n");
        let expected_rules = "\
set firewall family inet filter ri0 term 0 from source-address 10.0.0.0/24
set firewall family inet filter ri0 term 0 from source-port 1024
set firewall family inet filter ri0 term 0 from protocol tcp
set firewall family inet filter ri0 term 0 then accept
set firewall family inet filter ro0 term 0 from destination-address any
set firewall family inet filter ro0 term 0 from destination-port 80
set firewall family inet filter ro0 term 0 from protocol tcp
set firewall family inet filter ro0 term 0 then accept
set interfaces ge-0/0/1 unit 0 family inet filter input-list ri0
set interfaces ge-0/0/2 unit 0 family inet filter output-list ro0
";
        assert!(out.starts_with(expected_rules), "got:\n{out}");
    }

    #[test]
    fn twoway_allocates_fresh_names_and_swaps_roles() {
        let out = translate(
            "TWOWAY_ALLOW:n-10.0.0.1;ge_0_0_1;1024;;;0;n-10.0.1.1;ge_0_0_2;80;;;0;ANY;\n",
        );
        assert!(out.contains("filter ri1 term 0 from source-address 10.0.1.1\n"));
        assert!(out.contains("filter ri1 term 0 from destination-port 1024\n"));
        assert!(out.contains("filter ro1 term 0 from destination-address 10.0.0.1\n"));
        assert!(out.contains("filter ro1 term 0 from source-port 80\n"));
        assert!(out.contains("set interfaces ge-0/0/2 unit 0 family inet filter input-list ri1\n"));
        assert!(out.contains("set interfaces ge-0/0/1 unit 0 family inet filter output-list ro1\n"));
        assert!(!out.contains("from protocol"));
    }

    #[test]
    fn unlocalized_rule_is_fatal() {
        let err = Junos
            .translate("ALLOW:n-10.0.0.1;;0;;;0;n-10.0.1.1;ge_0_0_2;0;;;0;ANY;\n")
            .expect_err("unlocalized");
        assert!(matches!(err, TranslateError::Unlocalized { .. }));
    }

    #[test]
    fn unlocalized_policy_is_fatal() {
        let err = Junos
            .translate("POLICY_DROP:ANY;;0;ANY;ge_0_0_2;0;ANY\n")
            .expect_err("unlocalized");
        assert!(matches!(err, TranslateError::Unlocalized { .. }));
    }

    #[test]
    fn masquerade_uses_interface_translation() {
        let out = translate("ALLOW:n-10.0.0.0/24;lan;0;MASQUERADE;;0;ANY;wan;0;;;0;ANY;\n");
        assert!(out.contains("set security nat source rule-set rs0 from zone lan\n"));
        assert!(out.contains("set security nat source rule-set rs0 to zone wan\n"));
        assert!(out.contains(
            "set security nat source rule-set rs0 rule masquerade match destination-address 0.0.0.0/0\n"
        ));
        assert!(out.contains("rule masquerade then source-nat interface\n"));
    }

    #[test]
    fn each_nat_gets_its_own_pool() {
        let out = translate(
            "ALLOW:n-10.0.0.0/24;lan;0;n-5.5.5.5;;0;ANY;wan;0;;;0;ANY;\n\
             ALLOW:n-10.0.1.0/24;lan;0;n-5.5.5.5;;0;ANY;wan;0;;;0;ANY;\n",
        );
        assert!(out.contains("set security nat source pool pool0 address 5.5.5.5\n"));
        assert!(out.contains("set security nat source pool pool1 address 5.5.5.5\n"));
        assert!(out.contains("set security nat source pool pool0 port no-translation\n"));
        assert!(out.contains("rule-set rs1 rule source-nat then source-nat pool pool1\n"));
    }

    #[test]
    fn destination_nat_pools_internal_host() {
        let out =
            translate("ALLOW:ANY;wan;0;;;0;n-10.0.0.5;dmz;80;n-1.2.3.4;;8080;TCP;\n");
        assert!(out.contains("set security nat destination pool pool0 address 10.0.0.5\n"));
        assert!(out.contains("set security nat destination pool pool0 port 80\n"));
        assert!(out.contains(
            "set security nat destination rule-set rs0 rule destination-nat match destination-address 1.2.3.4\n"
        ));
        assert!(out.contains("rule destination-nat match destination-port 8080\n"));
        assert!(out.contains("rule destination-nat then destination-nat pool pool0\n"));
    }

    #[test]
    fn policies_share_address_book_entries() {
        let out = translate(
            "POLICY_DROP:n-10.0.0.0/24;trust;0;n-10.9.9.9;untrust;0;ANY\n\
             POLICY_REJECT:n-10.9.9.9;untrust;0;n-10.0.0.0/24;trust;22;TCP\n",
        );
        assert_eq!(out.matches("address-book address").count(), 2);
        assert!(out.contains(
            "set security zones security-zone trust address-book address ep0 10.0.0.0/24\n"
        ));
        assert!(out.contains(
            "set security zones security-zone untrust address-book address ep1 10.9.9.9\n"
        ));
        assert!(out.contains("policy pr0 match source-address ep0\n"));
        assert!(out.contains("policy pr1 match source-address ep1\n"));
        assert!(out.contains("policy pr1 match destination-address ep0\n"));
        assert!(out.contains("policy pr1 match destination-port 22\n"));
        assert!(out.contains("policy pr1 match protocol tcp\n"));
        assert!(out.contains("policy pr0 then discard\n"));
        assert!(out.contains("policy pr1 then reject\n"));
    }

    #[test]
    fn wildcard_policy_endpoint_maps_to_any() {
        let out = translate("POLICY_DROP:ANY;trust;0;ANY;untrust;0;ANY\n");
        assert!(!out.contains("address-book address"));
        assert!(out.contains("match source-address any\n"));
    }

    #[test]
    fn output_sections_follow_fixed_order() {
        let out = translate(
            "POLICY_DROP:ANY;trust;0;ANY;untrust;0;ANY\n\
             OPTION:static_route;IP_192_168_1_1\n\
             BIND:ge_0_0_1;10.0.0.1/24\n\
             ALLOW:n-10.0.0.0/24;ge_0_0_1;0;n-5.5.5.5;;0;ANY;ge_0_0_2;0;;;0;ANY;\n",
        );
        let order = [
            "set firewall family inet filter ri0",
            "delete interfaces ge-0/0/1",
            "set interfaces ge-0/0/1 unit 0 family inet address",
            "set routing-options static route 0.0.0.0/0 next-hop 192.168.1.1",
            "set security zones security-zone ge_0_0_1 interfaces",
            "delete security policies",
            "set security policies from-zone trust",
            "delete security nat",
            "set security nat source pool pool0",
            "set security nat source rule-set rs0",
            "commit",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| out.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }
}
