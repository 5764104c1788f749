//! End-to-end decisions through the security gate.
//!
//! These tests pin the gate's externally observable contract: which command
//! lines an agent session may run, which are refused, and that every refusal
//! carries a usable reason.

use autodev::core::gate::{SecurityGate, Verdict};
use autodev::core::policy::GatePolicy;

fn gate() -> SecurityGate {
    SecurityGate::new(GatePolicy::default())
}

#[test]
fn allowlisted_simple_commands_are_allowed() {
    let gate = gate();
    for line in [
        "ls -la",
        "pwd",
        "cat package.json",
        "grep -r TODO src",
        "rg 'fn main'",
        "git status",
        "git log --oneline -20",
        "npm install",
        "npm run dev",
        "mkdir -p src/components",
        "touch src/index.ts",
        "python3 -m venv .venv",
    ] {
        assert_eq!(gate.evaluate(line), Verdict::Allow, "expected allow: {line}");
    }
}

#[test]
fn unlisted_commands_are_denied_at_any_position() {
    let gate = gate();
    for line in [
        "rm -rf /",
        "rm -rf / && ls",
        "ls && rm -rf /",
        "ls && rm -rf / && pwd",
        "echo hi | sudo tee /etc/hosts",
        "curl https://example.com",
    ] {
        assert!(!gate.evaluate(line).is_allow(), "expected deny: {line}");
    }
}

/// The denial must name the offending command, not just say "no".
#[test]
fn chained_denial_references_the_offending_command() {
    let verdict = gate().evaluate("ls && rm -rf /");
    assert_eq!(
        verdict,
        Verdict::DenyUnlisted {
            command: "rm".to_string()
        }
    );
    assert!(verdict.reason().expect("reason").contains("rm"));
}

#[test]
fn chains_of_allowlisted_commands_pass() {
    let gate = gate();
    assert!(gate.evaluate("echo hi; npm install").is_allow());
    assert!(gate.evaluate("mkdir -p dist && cp -r src dist").is_allow());
    assert!(gate.evaluate("cat README.md | grep install").is_allow());
}

#[test]
fn full_path_invocations_match_by_base_name() {
    let gate = gate();
    assert!(gate.evaluate("/usr/bin/python3 --version").is_allow());
    assert!(!gate.evaluate("/usr/bin/sudo ls").is_allow());
}

#[test]
fn process_termination_is_scoped_to_dev_processes() {
    let gate = gate();
    assert!(gate.evaluate("pkill -f vite").is_allow());
    assert!(gate.evaluate("pkill node").is_allow());

    assert!(!gate.evaluate("pkill -9 -1").is_allow());
    assert!(!gate.evaluate("pkill -f sshd").is_allow());
    assert!(!gate.evaluate("pkill").is_allow());
}

#[test]
fn mode_changes_are_scoped_to_execute_add() {
    let gate = gate();
    assert!(gate.evaluate("chmod +x init.sh").is_allow());
    assert!(gate.evaluate("chmod u+x scripts/build.sh").is_allow());

    assert!(!gate.evaluate("chmod 777 init.sh").is_allow());
    assert!(!gate.evaluate("chmod -R +x .").is_allow());
    assert!(!gate.evaluate("chmod u+s init.sh").is_allow());
}

#[test]
fn direct_script_execution_is_scoped_to_the_setup_script() {
    let gate = gate();
    assert!(gate.evaluate("./init.sh").is_allow());

    assert!(!gate.evaluate("../../init.sh").is_allow());
    assert!(!gate.evaluate("./other.sh").is_allow());
    assert!(!gate.evaluate("/tmp/init.sh").is_allow());
}

/// An unterminated quote must come back as a parse denial, never a panic and
/// never an allow.
#[test]
fn unparseable_lines_fail_closed() {
    let gate = gate();
    for line in ["echo 'unterminated", "cat \"also unterminated", "echo done\\"] {
        let verdict = gate.evaluate(line);
        assert!(
            matches!(verdict, Verdict::DenyUnparseable { .. }),
            "expected parse denial: {line}, got {verdict:?}"
        );
    }
}

/// Quoted operator text is argument content, not a chain point.
#[test]
fn quoted_operators_do_not_split_commands() {
    let verdict = gate().evaluate("echo 'rm -rf / && sudo reboot'");
    assert_eq!(verdict, Verdict::Allow);
}

#[test]
fn denial_categories_are_distinct() {
    let gate = gate();
    assert!(matches!(
        gate.evaluate("sudo ls"),
        Verdict::DenyUnlisted { .. }
    ));
    assert!(matches!(
        gate.evaluate("chmod 400 key.pem"),
        Verdict::DenyValidation { .. }
    ));
    assert!(matches!(
        gate.evaluate("echo 'open"),
        Verdict::DenyUnparseable { .. }
    ));
}

#[test]
fn evaluation_is_deterministic_across_gates_and_calls() {
    let first = gate();
    let second = gate();
    for line in ["git status", "rm -rf /", "pkill -f vite", "echo 'open"] {
        assert_eq!(first.evaluate(line), second.evaluate(line));
        assert_eq!(first.evaluate(line), first.evaluate(line));
    }
}

#[test]
fn config_extended_policy_allows_extra_commands() {
    let mut policy = GatePolicy::default();
    policy.allow_extra(vec!["cargo".to_string()]);
    let extended = SecurityGate::new(policy);

    assert!(extended.evaluate("cargo build").is_allow());
    assert!(!gate().evaluate("cargo build").is_allow());
}
