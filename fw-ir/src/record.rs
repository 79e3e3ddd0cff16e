use std::fmt;

use serde::Serialize;

/// Host token meaning "the enforcing node itself".
pub const LOCAL: &str = "LOCAL";
/// Host and protocol wildcard.
pub const ANY: &str = "ANY";
/// Source-NAT marker requesting dynamic rewrite to the outbound interface address.
pub const MASQUERADE: &str = "MASQUERADE";
/// Port token meaning "no port restriction".
pub const NO_PORT: &str = "0";
/// Network bound by a `BIND` record when the interface accepts any source.
pub const ANY_NETWORK: &str = "0.0.0.0/0";

/// Keyword tag of one IR line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Keyword {
    Option,
    Bind,
    Allow,
    Drop,
    Reject,
    TwowayAllow,
    PolicyDrop,
    PolicyReject,
    Custom,
    /// Anything outside the vocabulary. Kept so generators can warn about it.
    Unknown(String),
}

impl Keyword {
    /// Resolve a keyword token, accepting the legacy four-letter spellings.
    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "OPTION" | "OPTN" => Self::Option,
            "BIND" => Self::Bind,
            "ALLOW" | "ALLW" => Self::Allow,
            "DROP" => Self::Drop,
            "REJECT" | "RJCT" => Self::Reject,
            "TWOWAY_ALLOW" | "TALW" => Self::TwowayAllow,
            "POLICY_DROP" | "PDRP" => Self::PolicyDrop,
            "POLICY_REJECT" | "PRJC" => Self::PolicyReject,
            "CUSTOM" | "CSTM" => Self::Custom,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_rule(&self) -> bool {
        matches!(
            self,
            Self::Allow | Self::Drop | Self::Reject | Self::TwowayAllow
        )
    }

    pub fn is_policy(&self) -> bool {
        matches!(self, Self::PolicyDrop | Self::PolicyReject)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Option => "OPTION",
            Self::Bind => "BIND",
            Self::Allow => "ALLOW",
            Self::Drop => "DROP",
            Self::Reject => "REJECT",
            Self::TwowayAllow => "TWOWAY_ALLOW",
            Self::PolicyDrop => "POLICY_DROP",
            Self::PolicyReject => "POLICY_REJECT",
            Self::Custom => "CUSTOM",
            Self::Unknown(raw) => raw.as_str(),
        };
        f.write_str(name)
    }
}

/// One parsed IR line: `Keyword : Param[1] ; ... ; Param[n]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub keyword: Keyword,
    pub params: Vec<String>,
    /// Source line, used verbatim in generated comments.
    pub line: String,
}

/// A `(host, interface, port)` triple describing one side of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub interface: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(host: &str, interface: &str, port: &str) -> Self {
        Self {
            host: host.to_string(),
            interface: interface.to_string(),
            port: port.to_string(),
        }
    }

    pub fn host_kind(&self) -> HostToken {
        HostToken::classify(&self.host)
    }

    /// Port restriction, `None` for `"0"` or an empty token.
    pub fn port(&self) -> Option<&str> {
        match self.port.as_str() {
            "" | NO_PORT => None,
            port => Some(port),
        }
    }

    pub fn is_localized(&self) -> bool {
        !self.interface.is_empty()
    }

    /// NAT rewrite shape carried by a NAT endpoint.
    pub fn nat_kind(&self) -> NatTarget {
        if self.host.is_empty() {
            return NatTarget::None;
        }
        if self.host == MASQUERADE {
            return NatTarget::Masquerade;
        }
        match HostToken::classify(&self.host) {
            HostToken::Address(addr) => NatTarget::Address(addr),
            HostToken::Interface(name) => NatTarget::Interface(name),
            HostToken::Any | HostToken::Local => NatTarget::Unsupported(self.host.clone()),
        }
    }
}

/// Classification of a host token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HostToken {
    Any,
    Local,
    /// Literal network or address; the two-character marker (`n-`) is stripped.
    Address(String),
    Interface(String),
}

impl HostToken {
    pub fn classify(token: &str) -> Self {
        if token.is_empty() || token == ANY || token == "*" {
            return Self::Any;
        }
        if token == LOCAL {
            return Self::Local;
        }
        if token.as_bytes().get(1) == Some(&b'-') {
            return Self::Address(token[2..].to_string());
        }
        Self::Interface(token.to_string())
    }
}

/// Rewrite requested by a source/destination NAT field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NatTarget {
    None,
    Masquerade,
    Address(String),
    Interface(String),
    Unsupported(String),
}

/// The six semantic groups of a 14-parameter rule record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFields {
    pub source: Endpoint,
    pub source_nat: Endpoint,
    pub destination: Endpoint,
    pub destination_nat: Endpoint,
    pub protocol: String,
    pub custom_formula: String,
}

impl RuleFields {
    /// Flatten back into the 14 positional parameters.
    pub fn into_params(self) -> Vec<String> {
        let mut params = Vec::with_capacity(crate::parser::RULE_ARITY);
        for ep in [
            self.source,
            self.source_nat,
            self.destination,
            self.destination_nat,
        ] {
            params.extend([ep.host, ep.interface, ep.port]);
        }
        params.push(self.protocol);
        params.push(self.custom_formula);
        params
    }

    /// Protocol restriction, `None` for the wildcard.
    pub fn protocol(&self) -> Option<String> {
        protocol_restriction(&self.protocol)
    }
}

fn protocol_restriction(token: &str) -> Option<String> {
    match token.trim() {
        "" | ANY => None,
        proto => Some(proto.to_lowercase()),
    }
}

/// The seven parameters of a `POLICY_DROP`/`POLICY_REJECT` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyFields {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub protocol: String,
}

impl PolicyFields {
    pub fn protocol(&self) -> Option<String> {
        protocol_restriction(&self.protocol)
    }

    /// Policy expressed as a rule with no NAT and no custom formula.
    pub fn into_rule(self) -> RuleFields {
        let no_nat = Endpoint::new("", "", NO_PORT);
        RuleFields {
            source: self.source,
            source_nat: no_nat.clone(),
            destination: self.destination,
            destination_nat: no_nat,
            protocol: self.protocol,
            custom_formula: String::new(),
        }
    }
}
