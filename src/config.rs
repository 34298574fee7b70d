//! Process configuration from command-line arguments.
//!
//! Builds the ordered list of `ProcessSpec`s the manager runs: aligns names
//! with commands, parses name decorators, de-duplicates display names, and
//! distributes working directories and environment overrides.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};

/// Per-process display-name decorators.
///
/// Decorators are parsed off the end of a raw `-n` entry in any order and may
/// stack (`helix:w!` and `helix!:w` both parse). The display name keeps its
/// raw form so decorated and undecorated entries stay distinct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decorators {
    /// `!`: keep Esc and Shift-Tab flowing to the child instead of leaving
    /// focus mode.
    pub passthrough: bool,
    /// `:w`: wrap long lines in the output panel.
    pub wrap: bool,
}

/// Specification for one managed process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Display name (decorators preserved, uniqueness suffix applied).
    pub name: String,
    /// Decorators stripped from the raw name.
    pub decorators: Decorators,
    /// Shell command line, run via the platform shell.
    pub command: String,
    /// Working directory for the child.
    pub cwd: Option<String>,
    /// Environment overrides merged over the parent environment.
    pub env: HashMap<String, String>,
    /// Restart automatically one second after a non-zero exit.
    pub auto_restart: bool,
}

/// Runtime configuration derived from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub processes: Vec<ProcessSpec>,
    /// Global: forward Shift-Tab to the child instead of exiting focus mode.
    pub no_shift_tab: bool,
    /// Grace period between SIGTERM and SIGKILL, in milliseconds.
    pub kill_timeout_ms: u64,
}

impl Config {
    pub fn from_args(
        commands: Vec<String>,
        names: Option<String>,
        cwds: Vec<String>,
        env_entries: Vec<String>,
        restart_on_fail: bool,
        no_shift_tab: bool,
        kill_timeout_ms: u64,
    ) -> Result<Self> {
        let name_list: Vec<String> = names
            .map(|n| n.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let cwds = align_list(&cwds, commands.len(), "cwd")?;

        let mut used_names: Vec<String> = Vec::new();
        let mut processes = Vec::with_capacity(commands.len());
        for (i, command) in commands.into_iter().enumerate() {
            let raw_name = name_list
                .get(i)
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| format!("proc{}", i + 1));
            let decorators = parse_decorators(&raw_name);
            let name = uniquify(&raw_name, &used_names);
            used_names.push(name.clone());
            processes.push(ProcessSpec {
                name,
                decorators,
                command,
                cwd: cwds.get(i).cloned().unwrap_or(None),
                env: HashMap::new(),
                auto_restart: restart_on_fail,
            });
        }

        apply_env_entries(&mut processes, &env_entries)?;

        Ok(Self {
            processes,
            no_shift_tab,
            kill_timeout_ms,
        })
    }
}

/// Strips trailing `!` and `:w` markers (in any order) off a raw name.
fn parse_decorators(raw: &str) -> Decorators {
    let mut rest = raw;
    let mut decorators = Decorators::default();
    loop {
        if let Some(stripped) = rest.strip_suffix('!') {
            rest = stripped;
            decorators.passthrough = true;
        } else if let Some(stripped) = rest.strip_suffix(":w") {
            rest = stripped;
            decorators.wrap = true;
        } else {
            break;
        }
    }
    decorators
}

/// Appends `-2`, `-3`, … until the candidate collides with no earlier name.
fn uniquify(base: &str, used: &[String]) -> String {
    if !used.iter().any(|n| n.as_str() == base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !used.iter().any(|existing| existing.as_str() == candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Allow a single shared value or a fully aligned list.
fn align_list(values: &[String], len: usize, label: &str) -> Result<Vec<Option<String>>> {
    if values.is_empty() {
        return Ok(vec![None; len]);
    }
    if values.len() == 1 && len > 1 {
        return Ok(vec![Some(values[0].clone()); len]);
    }
    if values.len() != len {
        bail!(
            "expected {} values for --{}, got {}",
            len,
            label,
            values.len()
        );
    }
    Ok(values.iter().cloned().map(Some).collect())
}

/// Distributes `--env` entries: `KEY=VAL` applies to every process,
/// `<index>:KEY=VAL` or `<name>:KEY=VAL` scopes an entry to one process.
fn apply_env_entries(processes: &mut [ProcessSpec], entries: &[String]) -> Result<()> {
    for entry in entries {
        if let Some((prefix, rest)) = entry.split_once(':') {
            if let Ok(index) = prefix.parse::<usize>() {
                let (key, value) = split_env(rest)?;
                let process = processes
                    .get_mut(index)
                    .ok_or_else(|| anyhow!("env index {} out of range", index))?;
                process.env.insert(key, value);
                continue;
            }
            if let Some(process) = processes.iter_mut().find(|p| p.name == prefix) {
                let (key, value) = split_env(rest)?;
                process.env.insert(key, value);
                continue;
            }
        }
        let (key, value) = split_env(entry)?;
        for process in processes.iter_mut() {
            process.env.insert(key.clone(), value.clone());
        }
    }
    Ok(())
}

fn split_env(value: &str) -> Result<(String, String)> {
    let (key, val) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid env {}, expected KEY=VALUE", value))?;
    Ok((key.to_string(), val.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(commands: &[&str], names: Option<&str>) -> Config {
        Config::from_args(
            commands.iter().map(|c| c.to_string()).collect(),
            names.map(|n| n.to_string()),
            Vec::new(),
            Vec::new(),
            false,
            false,
            50,
        )
        .unwrap()
    }

    #[test]
    fn default_names_are_numbered() {
        let config = config(&["echo a", "echo b"], None);
        let names: Vec<_> = config.processes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["proc1", "proc2"]);
    }

    #[test]
    fn missing_and_empty_names_fall_back() {
        let config = config(&["a", "b", "c"], Some("web,"));
        let names: Vec<_> = config.processes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["web", "proc2", "proc3"]);
    }

    #[test]
    fn duplicate_names_get_suffixes() {
        let config = config(&["c1", "c2", "c3"], Some("a,a,a"));
        let names: Vec<_> = config.processes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a-2", "a-3"]);
    }

    #[test]
    fn suffix_skips_taken_candidates() {
        let config = config(&["c1", "c2", "c3"], Some("a,a-2,a"));
        let names: Vec<_> = config.processes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a-2", "a-3"]);
    }

    #[test]
    fn decorators_parse_in_any_order() {
        assert_eq!(
            parse_decorators("build:w!"),
            Decorators {
                passthrough: true,
                wrap: true
            }
        );
        assert_eq!(
            parse_decorators("build!:w"),
            Decorators {
                passthrough: true,
                wrap: true
            }
        );
        assert_eq!(
            parse_decorators("helix!"),
            Decorators {
                passthrough: true,
                wrap: false
            }
        );
        assert_eq!(parse_decorators("plain"), Decorators::default());
    }

    #[test]
    fn decorated_name_keeps_raw_form() {
        let config = config(&["echo hi"], Some("build:w"));
        assert_eq!(config.processes[0].name, "build:w");
        assert!(config.processes[0].decorators.wrap);
        assert!(!config.processes[0].decorators.passthrough);
    }

    #[test]
    fn env_entries_scope_globally_and_per_process() {
        let config = Config::from_args(
            vec!["c1".into(), "c2".into()],
            Some("api,web".into()),
            Vec::new(),
            vec![
                "SHARED=1".into(),
                "api:PORT=3000".into(),
                "1:PORT=4000".into(),
            ],
            false,
            false,
            50,
        )
        .unwrap();
        assert_eq!(config.processes[0].env.get("SHARED").unwrap(), "1");
        assert_eq!(config.processes[0].env.get("PORT").unwrap(), "3000");
        assert_eq!(config.processes[1].env.get("PORT").unwrap(), "4000");
    }

    #[test]
    fn single_cwd_is_shared() {
        let config = Config::from_args(
            vec!["c1".into(), "c2".into()],
            None,
            vec!["/tmp".into()],
            Vec::new(),
            false,
            false,
            50,
        )
        .unwrap();
        assert_eq!(config.processes[0].cwd.as_deref(), Some("/tmp"));
        assert_eq!(config.processes[1].cwd.as_deref(), Some("/tmp"));
    }

    #[test]
    fn misaligned_cwd_list_is_rejected() {
        let result = Config::from_args(
            vec!["c1".into(), "c2".into(), "c3".into()],
            None,
            vec!["/a".into(), "/b".into()],
            Vec::new(),
            false,
            false,
            50,
        );
        assert!(result.is_err());
    }
}
