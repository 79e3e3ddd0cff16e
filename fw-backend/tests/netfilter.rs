use fw_backend::engine::Generator;
use fw_backend::netfilter::Netfilter;
use pretty_assertions::assert_eq;

fn translate(text: &str) -> String {
    Netfilter.translate(text).expect("translate")
}

fn nat_section(out: &str) -> &str {
    let start = out.find("*nat\n").expect("nat table");
    &out[start..]
}

#[test]
fn forward_rule_with_ports_and_protocol() {
    let out = translate("BIND:eth0;10.0.0.0/24\nALLOW:n-10.0.0.1;;80;;;;n-10.0.0.2;;443;;;;TCP;");

    let forward: Vec<&str> = out
        .lines()
        .filter(|l| l.starts_with("-A FORWARD -p"))
        .collect();
    assert_eq!(forward.len(), 1);
    let rule = forward[0];
    for fragment in ["-s 10.0.0.1", "--sport 80", "-d 10.0.0.2", "--dport 443", "-j ACCEPT"] {
        assert!(rule.contains(fragment), "{fragment} missing from {rule}");
    }
    let protocol = rule.find("-p tcp").expect("protocol match");
    assert!(protocol < rule.find("--sport").expect("sport"));
    assert!(protocol < rule.find("--dport").expect("dport"));
    assert_eq!(nat_section(&out), "*nat\nCOMMIT\n");
    assert!(out.contains("-A PREROUTING -i eth0 -s 10.0.0.0/24 -j ACCEPT"));
}

#[test]
fn twoway_allow_emits_swapped_forward_pair() {
    let out = translate("TWOWAY_ALLOW:n-10.0.0.1;;1024;;;0;n-10.0.0.2;;80;;;0;TCP;\n");
    let forward: Vec<&str> = out
        .lines()
        .filter(|l| l.starts_with("-A FORWARD") && l.contains("TWOWAY_ALLOW"))
        .map(|l| l.split(" -j ").next().unwrap_or_default())
        .collect();
    assert_eq!(
        forward,
        vec![
            "-A FORWARD -p tcp -s 10.0.0.1 --sport 1024 -d 10.0.0.2 --dport 80",
            "-A FORWARD -p tcp -s 10.0.0.2 --sport 80 -d 10.0.0.1 --dport 1024",
        ]
    );
}

#[test]
fn translation_is_idempotent() {
    let text = "OPTION:established;yes\n\
                BIND:lan;192.168.0.0/24\n\
                BIND:wan;0.0.0.0/0\n\
                ALLOW:lan;;0;MASQUERADE;;0;wan;;0;;;0;ANY;\n\
                ALLOW:ANY;;0;;;0;n-192.168.0.10;;22;n-1.2.3.4;;2222;TCP;\n\
                TWOWAY_ALLOW:LOCAL;;0;;;0;lan;;0;;;0;ANY;\n\
                POLICY_REJECT:ANY;;0;ANY;;0;ANY\n";
    assert_eq!(translate(text), translate(text));
}

#[test]
fn policies_follow_all_rules() {
    for rules in 0..4 {
        for policies in 0..3 {
            let mut text = String::new();
            for i in 0..policies {
                text.push_str(&format!("POLICY_DROP:n-10.1.{i}.0/24;;0;ANY;;0;ANY\n"));
            }
            for i in 0..rules {
                text.push_str(&format!(
                    "ALLOW:n-10.0.{i}.1;;0;;;0;n-10.9.9.9;;0;;;0;ANY;\n"
                ));
            }
            let out = translate(&text);
            let filter_rules: Vec<&str> = out
                .lines()
                .filter(|l| l.starts_with("-A FORWARD -p all -s 10."))
                .collect();
            assert_eq!(filter_rules.len(), rules + policies);
            let first_policy = filter_rules
                .iter()
                .position(|l| l.contains("POLICY_DROP"))
                .unwrap_or(filter_rules.len());
            assert!(filter_rules[..first_policy]
                .iter()
                .all(|l| l.contains("\"ALLOW:")));
            assert!(filter_rules[first_policy..]
                .iter()
                .all(|l| l.contains("POLICY_DROP")));
            assert_eq!(first_policy, rules);
        }
    }
}

#[test]
fn logging_option_removes_logging_chains() {
    let with_logging = translate("ALLOW:ANY;;0;;;0;ANY;;0;;;0;ANY;\n");
    assert!(with_logging.contains("-N filter_drop\n"));
    assert!(with_logging.contains("-N mangle_drop\n"));

    let out = translate("OPTION:logging;no\nALLOW:ANY;;0;;;0;ANY;;0;;;0;ANY;\n");
    assert!(!out.contains("LOG --log-prefix"));
    assert!(!out.contains("filter_drop"));
    assert!(!out.contains("mangle_drop"));
}

#[test]
fn blank_lines_only_yield_scaffold() {
    let out = translate("\n\n  \n");
    assert_eq!(out.matches("COMMIT\n").count(), 3);
    assert!(out.starts_with("*filter\n-P INPUT DROP\n"));
    assert!(!out.contains("--comment \"ALLOW"));
    assert!(!out.contains("POSTROUTING"));
    assert_eq!(nat_section(&out), "*nat\nCOMMIT\n");
}

#[test]
fn legacy_keywords_translate_like_current_ones() {
    let legacy = translate("ALLW:n-10.0.0.1;;0;;;0;n-10.0.0.2;;0;;;0;ANY;\n");
    let current = translate("ALLOW:n-10.0.0.1;;0;;;0;n-10.0.0.2;;0;;;0;ANY;\n");
    let rule = |out: &str| {
        out.lines()
            .find(|l| l.starts_with("-A FORWARD -p all -s"))
            .map(|l| l.split(" -m comment").next().unwrap_or_default().to_string())
    };
    assert_eq!(rule(&legacy), rule(&current));
}
