//! Shell command extraction for the security gate.
//!
//! A raw command line may chain several executables (`a && b | c`), and the
//! gate must judge every one of them. Tokenization is shell-aware via `shlex`:
//! naive whitespace or regex splitting would both over-split quoted arguments
//! and treat quoted operator text as a chain point. A line `shlex` cannot
//! tokenize is a [`ParseError`], never a pass.

use std::fmt;
use std::path::Path;

/// Operators that chain sub-commands at the top level of a command line.
const CHAIN_OPERATORS: [&str; 4] = ["&&", "||", ";", "|"];

/// One executable invocation extracted from a (possibly compound) command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubCommand {
    /// First token of the segment as written (directory path intact).
    pub program: String,
    /// Executable name with any directory path stripped
    /// (`/usr/bin/python3` and `python3` both yield `python3`).
    pub base_name: String,
    /// Argument tokens after the executable, quotes resolved.
    pub args: Vec<String>,
    /// The segment rejoined token-by-token, for diagnostics.
    pub raw: String,
}

/// The command line is not valid shell input (unbalanced quote, trailing
/// escape). The gate treats this as an automatic deny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not valid shell syntax: {}", self.line)
    }
}

impl std::error::Error for ParseError {}

/// Split a command line into the ordered sub-commands it would execute.
///
/// Splits on `&&`, `||`, `;` and `|` at the top level only; operator text
/// inside quotes survives tokenization as ordinary argument content and is
/// not a split point. Empty segments between operators are skipped.
pub fn extract_commands(line: &str) -> Result<Vec<SubCommand>, ParseError> {
    let tokens = shlex::split(line).ok_or_else(|| ParseError {
        line: line.to_string(),
    })?;

    let mut commands = Vec::new();
    let mut segment: Vec<String> = Vec::new();
    for token in tokens {
        if CHAIN_OPERATORS.contains(&token.as_str()) {
            flush_segment(&mut commands, &mut segment);
        } else {
            segment.push(token);
        }
    }
    flush_segment(&mut commands, &mut segment);
    Ok(commands)
}

fn flush_segment(commands: &mut Vec<SubCommand>, segment: &mut Vec<String>) {
    if segment.is_empty() {
        return;
    }
    let program = segment[0].clone();
    let base_name = Path::new(&program)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.clone());
    commands.push(SubCommand {
        base_name,
        args: segment[1..].to_vec(),
        raw: segment.join(" "),
        program,
    });
    segment.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_names(line: &str) -> Vec<String> {
        extract_commands(line)
            .expect("extract")
            .into_iter()
            .map(|c| c.base_name)
            .collect()
    }

    #[test]
    fn simple_command_yields_one_segment() {
        let commands = extract_commands("git status").expect("extract");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].base_name, "git");
        assert_eq!(commands[0].args, vec!["status".to_string()]);
        assert_eq!(commands[0].raw, "git status");
    }

    #[test]
    fn splits_on_all_chain_operators() {
        assert_eq!(base_names("ls && pwd"), vec!["ls", "pwd"]);
        assert_eq!(base_names("ls || pwd"), vec!["ls", "pwd"]);
        assert_eq!(base_names("ls ; pwd"), vec!["ls", "pwd"]);
        assert_eq!(base_names("cat f | grep x"), vec!["cat", "grep"]);
    }

    #[test]
    fn strips_directory_from_program_path() {
        let commands = extract_commands("/usr/bin/python3 -m http.server").expect("extract");
        assert_eq!(commands[0].base_name, "python3");
        assert_eq!(commands[0].program, "/usr/bin/python3");
    }

    #[test]
    fn quoted_operators_are_not_split_points() {
        let commands = extract_commands("echo 'a && b'").expect("extract");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].args, vec!["a && b".to_string()]);
    }

    #[test]
    fn unterminated_quote_is_a_parse_error() {
        let err = extract_commands("echo 'oops").unwrap_err();
        assert!(err.to_string().contains("not valid shell syntax"));
    }

    #[test]
    fn empty_segments_between_operators_are_skipped() {
        assert_eq!(base_names("ls && && pwd"), vec!["ls", "pwd"]);
        assert_eq!(base_names(" ; ls"), vec!["ls"]);
    }

    #[test]
    fn blank_line_yields_no_commands() {
        assert!(extract_commands("").expect("extract").is_empty());
        assert!(extract_commands("   ").expect("extract").is_empty());
    }
}
