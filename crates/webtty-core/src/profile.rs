//! Named shell profiles and the resolver that turns them into commands.
//!
//! A profile bundles a shell, a starting directory and a list of commands
//! typed into the terminal once the shell has settled. Profiles are loaded
//! once at startup and never change afterwards.

use crate::error::{WebttyError, WebttyResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the profile that always exists.
pub const DEFAULT_PROFILE: &str = "default";

/// Shell placeholder meaning "keep the user's login shell".
pub const DEFAULT_SHELL: &str = "$SHELL";

/// Working directory placeholder meaning "the user's home directory".
pub const DEFAULT_WORKING_DIRECTORY: &str = "$HOME";

pub const DEFAULT_ROOT: &str = "/";

/// A named bundle of shell, working directory and startup commands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Profile {
    /// Set from the mapping key, never from the file body.
    #[serde(skip)]
    pub name: String,
    pub shell: String,
    pub working_directory: String,
    /// Reserved for process confinement; stored only.
    pub root: String,
    pub title: String,
    pub commands: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            shell: DEFAULT_SHELL.to_string(),
            working_directory: DEFAULT_WORKING_DIRECTORY.to_string(),
            root: DEFAULT_ROOT.to_string(),
            title: String::new(),
            commands: Vec::new(),
        }
    }
}

impl Profile {
    /// Create a profile with default settings under the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Point `cmd` at this profile's working directory and shell.
    ///
    /// Fails only when the home directory cannot be determined.
    pub fn apply_to_command(&self, cmd: &mut CommandLine) -> WebttyResult<()> {
        let home = dirs::home_dir().ok_or(WebttyError::HomeDirUnavailable)?;
        self.apply_with_home(cmd, &home);
        Ok(())
    }

    fn apply_with_home(&self, cmd: &mut CommandLine, home: &Path) {
        let wd = self.working_directory.as_str();
        cmd.cwd = Some(if wd.is_empty() || wd == DEFAULT_WORKING_DIRECTORY {
            home.to_path_buf()
        } else if let Some(rest) = wd.strip_prefix("~/") {
            home.join(rest)
        } else {
            PathBuf::from(wd)
        });

        if self.overrides_shell() {
            if let Some(last) = cmd.argv.last_mut() {
                *last = self.shell.clone();
            }
        }
    }

    /// Whether the configured shell replaces the invocation's program slot.
    pub fn overrides_shell(&self) -> bool {
        !self.shell.is_empty()
            && self.shell != DEFAULT_SHELL
            && !self.shell.chars().any(char::is_whitespace)
    }

    /// Split each startup command into shell words.
    pub fn parse_commands(&self) -> WebttyResult<Vec<Vec<String>>> {
        self.commands
            .iter()
            .enumerate()
            .map(|(index, command)| {
                shlex::split(command.trim()).ok_or_else(|| WebttyError::MalformedCommand {
                    index,
                    command: command.clone(),
                })
            })
            .collect()
    }
}

/// Re-quote parsed words into a line the shell reads back as the same words.
pub fn join_words(words: &[String]) -> WebttyResult<String> {
    shlex::try_join(words.iter().map(String::as_str))
        .map_err(|e| WebttyError::Other(format!("cannot quote command: {e}")))
}

/// A process invocation: argv (program first) plus working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandLine {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    /// The invocation every session starts from. Its last argument is the
    /// program slot a profile shell replaces.
    pub fn login_shell() -> Self {
        Self::new(["/bin/sh", "-c", "exec \"${SHELL:-/bin/sh}\""])
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// All configured profiles, keyed by case-sensitive name.
///
/// The default profile is held apart so it can never be missing.
#[derive(Debug, Clone, Default)]
pub struct Profiles {
    default: Profile,
    named: BTreeMap<String, Profile>,
}

impl Profiles {
    /// Add or replace a profile. The profile's name becomes its key.
    pub fn insert(&mut self, profile: Profile) {
        if profile.name == DEFAULT_PROFILE {
            self.default = profile;
        } else {
            self.named.insert(profile.name.clone(), profile);
        }
    }

    /// Look up a profile; an empty name means the default profile.
    pub fn resolve(&self, name: &str) -> WebttyResult<&Profile> {
        match name {
            "" | DEFAULT_PROFILE => Ok(&self.default),
            _ => self
                .named
                .get(name)
                .ok_or_else(|| WebttyError::UnknownProfile(name.to_string())),
        }
    }

    /// Look up a profile, silently falling back to the default one.
    pub fn resolve_or_default(&self, name: &str) -> &Profile {
        self.resolve(name).unwrap_or(&self.default)
    }

    /// Names of all profiles except the default one, sorted.
    pub fn extra_names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> PathBuf {
        PathBuf::from("/home/tester")
    }

    fn applied(profile: &Profile, argv: &[&str]) -> CommandLine {
        let mut cmd = CommandLine::new(argv.iter().copied());
        profile.apply_with_home(&mut cmd, &home());
        cmd
    }

    fn with_wd(wd: &str) -> Profile {
        Profile {
            working_directory: wd.to_string(),
            shell: String::new(),
            ..Profile::default()
        }
    }

    fn with_shell(shell: &str) -> Profile {
        Profile {
            working_directory: String::new(),
            shell: shell.to_string(),
            ..Profile::default()
        }
    }

    #[test]
    fn empty_working_directory_is_home() {
        assert_eq!(applied(&with_wd(""), &["test"]).cwd, Some(home()));
    }

    #[test]
    fn home_placeholder_is_home() {
        assert_eq!(applied(&with_wd("$HOME"), &["test"]).cwd, Some(home()));
    }

    #[test]
    fn tilde_prefix_expands() {
        assert_eq!(
            applied(&with_wd("~/custom"), &["test"]).cwd,
            Some(home().join("custom"))
        );
    }

    #[test]
    fn absolute_directory_is_verbatim() {
        assert_eq!(
            applied(&with_wd("/custom/dir"), &["test"]).cwd,
            Some(PathBuf::from("/custom/dir"))
        );
        // Only a leading "~/" is special.
        assert_eq!(
            applied(&with_wd("~other"), &["test"]).cwd,
            Some(PathBuf::from("~other"))
        );
    }

    #[test]
    fn custom_shell_replaces_last_argument() {
        let cmd = applied(&with_shell("/bin/customsh"), &["test", "-c", "echo"]);
        assert_eq!(cmd.argv, vec!["test", "-c", "/bin/customsh"]);
        assert_eq!(cmd.cwd, Some(home()));
    }

    #[test]
    fn shell_placeholder_keeps_arguments() {
        let cmd = applied(&with_shell("$SHELL"), &["test", "-c", "echo"]);
        assert_eq!(cmd.argv, vec!["test", "-c", "echo"]);
    }

    #[test]
    fn shell_with_whitespace_keeps_arguments() {
        let cmd = applied(&with_shell("/bin/zsh -l"), &["test", "-c", "echo"]);
        assert_eq!(cmd.argv, vec!["test", "-c", "echo"]);
        let cmd = applied(&with_shell("/bin/zsh\t"), &["test", "-c", "echo"]);
        assert_eq!(cmd.argv, vec!["test", "-c", "echo"]);
    }

    #[test]
    fn empty_shell_keeps_arguments() {
        let cmd = applied(&with_shell(""), &["test", "-c", "echo"]);
        assert_eq!(cmd.argv, vec!["test", "-c", "echo"]);
    }

    #[test]
    fn apply_uses_real_home() {
        let Some(real_home) = dirs::home_dir() else {
            return;
        };
        let mut cmd = CommandLine::login_shell();
        with_wd("$HOME").apply_to_command(&mut cmd).unwrap();
        assert_eq!(cmd.cwd, Some(real_home));
    }

    #[test]
    fn login_shell_program_slot() {
        let mut cmd = CommandLine::login_shell();
        assert_eq!(cmd.program(), Some("/bin/sh"));
        assert_eq!(cmd.args().len(), 2);
        with_shell("/bin/bash").apply_with_home(&mut cmd, &home());
        assert_eq!(cmd.args(), ["-c", "/bin/bash"]);
    }

    fn parse(commands: &[&str]) -> WebttyResult<Vec<Vec<String>>> {
        Profile {
            commands: commands.iter().map(|s| s.to_string()).collect(),
            ..Profile::default()
        }
        .parse_commands()
    }

    #[test]
    fn parse_single_and_multiple() {
        assert_eq!(parse(&["echo hello"]).unwrap(), vec![vec!["echo", "hello"]]);
        assert_eq!(
            parse(&["echo hello", "ls -l"]).unwrap(),
            vec![vec!["echo", "hello"], vec!["ls", "-l"]]
        );
    }

    #[test]
    fn parse_honors_quotes_and_trims() {
        assert_eq!(
            parse(&["  echo \"hello world\"  "]).unwrap(),
            vec![vec!["echo", "hello world"]]
        );
        assert_eq!(
            parse(&[r"printf 'a b' c\ d"]).unwrap(),
            vec![vec!["printf", "a b", "c d"]]
        );
    }

    #[test]
    fn parse_empty_command() {
        assert_eq!(parse(&[""]).unwrap(), vec![Vec::<String>::new()]);
        assert!(parse(&[]).unwrap().is_empty());
    }

    #[test]
    fn parse_reports_malformed_command() {
        match parse(&["ls", "echo \"unterminated"]) {
            Err(WebttyError::MalformedCommand { index, command }) => {
                assert_eq!(index, 1);
                assert_eq!(command, "echo \"unterminated");
            }
            other => panic!("expected MalformedCommand, got {other:?}"),
        }
    }

    #[test]
    fn joined_words_round_trip_through_shell_rules() {
        let words = vec!["echo".to_string(), "hello world".to_string()];
        let line = join_words(&words).unwrap();
        assert_eq!(shlex::split(&line).unwrap(), words);
    }

    #[test]
    fn resolve_default_and_empty_match() {
        let profiles = Profiles::default();
        assert_eq!(
            profiles.resolve("").unwrap(),
            profiles.resolve("default").unwrap()
        );
    }

    #[test]
    fn resolve_unknown_fails() {
        let profiles = Profiles::default();
        assert!(matches!(
            profiles.resolve("nonexistent"),
            Err(WebttyError::UnknownProfile(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn resolve_is_case_sensitive() {
        let mut profiles = Profiles::default();
        profiles.insert(Profile::named("Work"));
        assert!(profiles.resolve("Work").is_ok());
        assert!(profiles.resolve("work").is_err());
        assert_eq!(profiles.resolve_or_default("work").name, "default");
    }

    #[test]
    fn extra_names_skip_default() {
        let mut profiles = Profiles::default();
        profiles.insert(Profile::named("zeta"));
        profiles.insert(Profile::named("alpha"));
        assert_eq!(profiles.extra_names().collect::<Vec<_>>(), ["alpha", "zeta"]);
    }

    #[test]
    fn deserialize_fills_defaults() {
        let profile: Profile = serde_json::from_str(r#"{"shell": "/bin/zsh"}"#).unwrap();
        assert_eq!(profile.shell, "/bin/zsh");
        assert_eq!(profile.working_directory, "$HOME");
        assert_eq!(profile.root, "/");
        assert!(profile.commands.is_empty());
    }
}
