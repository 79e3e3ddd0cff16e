use thiserror::Error;

use crate::record::{Endpoint, Keyword, PolicyFields, Record, RuleFields};

/// Parameter count of `ALLOW`/`DROP`/`REJECT`/`TWOWAY_ALLOW` records.
pub const RULE_ARITY: usize = 14;
/// Parameter count of `POLICY_DROP`/`POLICY_REJECT` records.
pub const POLICY_ARITY: usize = 7;

/// Malformed IR. Always fatal for the translation run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrError {
    /// Line has no `:` between keyword and parameters.
    #[error("malformed record (missing ':' separator): {line}")]
    MissingSeparator { line: String },
    /// Record has the wrong number of `;`-separated parameters.
    #[error("malformed {keyword} record: expected {expected} parameters, found {found}")]
    Arity {
        keyword: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Split one IR line into keyword and ordered parameter list.
///
/// Splits on the first `:` only; parameters may therefore contain colons
/// (custom formulas often do). Empty parameters are kept.
pub fn parse_record(line: &str) -> Result<Record, IrError> {
    let (keyword, raw) = line
        .split_once(':')
        .ok_or_else(|| IrError::MissingSeparator {
            line: line.to_string(),
        })?;

    Ok(Record {
        keyword: Keyword::parse(keyword),
        params: raw.split(';').map(str::to_string).collect(),
        line: line.to_string(),
    })
}

/// Parse every non-empty line of one configuration, preserving order.
pub fn parse_configuration(text: &str) -> Result<Vec<Record>, IrError> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(parse_record)
        .collect()
}

/// Group a rule record's 14 parameters into their semantic fields.
pub fn rule_fields(params: &[String]) -> Result<RuleFields, IrError> {
    if params.len() != RULE_ARITY {
        return Err(IrError::Arity {
            keyword: "rule",
            expected: RULE_ARITY,
            found: params.len(),
        });
    }
    let endpoint = |at: usize| Endpoint::new(&params[at], &params[at + 1], &params[at + 2]);

    Ok(RuleFields {
        source: endpoint(0),
        source_nat: endpoint(3),
        destination: endpoint(6),
        destination_nat: endpoint(9),
        protocol: params[12].clone(),
        custom_formula: params[13].clone(),
    })
}

/// Group a policy record's 7 parameters.
pub fn policy_fields(params: &[String]) -> Result<PolicyFields, IrError> {
    if params.len() != POLICY_ARITY {
        return Err(IrError::Arity {
            keyword: "policy",
            expected: POLICY_ARITY,
            found: params.len(),
        });
    }
    Ok(PolicyFields {
        source: Endpoint::new(&params[0], &params[1], &params[2]),
        destination: Endpoint::new(&params[3], &params[4], &params[5]),
        protocol: params[6].clone(),
    })
}

/// Check that a `BIND` or `OPTION` record carries at least its two parameters.
pub fn pair_fields<'a>(
    record: &'a Record,
    keyword: &'static str,
) -> Result<(&'a str, &'a str), IrError> {
    if record.params.len() < 2 {
        return Err(IrError::Arity {
            keyword,
            expected: 2,
            found: record.params.len(),
        });
    }
    Ok((record.params[0].as_str(), record.params[1].as_str()))
}
