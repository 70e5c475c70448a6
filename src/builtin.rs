//! Built-in commands
//!
//! Built-ins run inside the shell process and only when they are the whole
//! command line. The job built-ins (`jobs`, `fg`, `bg`, `kill`) live in
//! `job_control`; the rest are here.

use crate::pipeline::CommandOutput;
use crate::shell::{Flow, Shell, ShellError};
use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Cd,
    Pwd,
    Jobs,
    Fg,
    Bg,
    Kill,
    History,
    Alias,
    Export,
    Exit,
}

impl Builtin {
    pub const ALL: [Builtin; 10] = [
        Builtin::Cd,
        Builtin::Pwd,
        Builtin::Jobs,
        Builtin::Fg,
        Builtin::Bg,
        Builtin::Kill,
        Builtin::History,
        Builtin::Alias,
        Builtin::Export,
        Builtin::Exit,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "pwd" => Some(Builtin::Pwd),
            "jobs" => Some(Builtin::Jobs),
            "fg" => Some(Builtin::Fg),
            "bg" => Some(Builtin::Bg),
            "kill" => Some(Builtin::Kill),
            "history" => Some(Builtin::History),
            "alias" => Some(Builtin::Alias),
            "export" => Some(Builtin::Export),
            "exit" => Some(Builtin::Exit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cd => "cd",
            Builtin::Pwd => "pwd",
            Builtin::Jobs => "jobs",
            Builtin::Fg => "fg",
            Builtin::Bg => "bg",
            Builtin::Kill => "kill",
            Builtin::History => "history",
            Builtin::Alias => "alias",
            Builtin::Export => "export",
            Builtin::Exit => "exit",
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Shell {
    pub(crate) fn run_builtin(
        &mut self,
        builtin: Builtin,
        args: &[String],
    ) -> Result<Flow, ShellError> {
        tracing::debug!(builtin = %builtin, ?args, "running builtin");
        let output = match builtin {
            Builtin::Cd => self.builtin_cd(args)?,
            Builtin::Pwd => self.builtin_pwd(),
            Builtin::Jobs => self.builtin_jobs(args),
            Builtin::Fg => self.builtin_fg(args)?,
            Builtin::Bg => self.builtin_bg(args),
            Builtin::Kill => self.builtin_kill(args)?,
            Builtin::History => self.builtin_history(),
            Builtin::Alias => self.builtin_alias(args)?,
            Builtin::Export => self.builtin_export(args)?,
            Builtin::Exit => return Ok(Flow::Exit),
        };
        Ok(Flow::Continue(output))
    }

    fn builtin_cd(&mut self, args: &[String]) -> Result<CommandOutput, ShellError> {
        let (shown, target) = match args.first() {
            Some(arg) => (arg.clone(), self.resolve_path(arg)),
            None => (self.home.display().to_string(), self.home.clone()),
        };

        let canonical = target.canonicalize().map_err(|e| ShellError::Cd {
            path: shown.clone().into(),
            reason: io_reason(&e),
        })?;

        if !canonical.is_dir() {
            return Err(ShellError::Cd {
                path: shown.into(),
                reason: "Not a directory".to_string(),
            });
        }

        self.env
            .insert("PWD".to_string(), canonical.display().to_string());
        self.cwd = canonical;
        Ok(CommandOutput::default())
    }

    fn builtin_pwd(&self) -> CommandOutput {
        CommandOutput::text(format!("{}\n", self.cwd.display()))
    }

    fn builtin_history(&self) -> CommandOutput {
        CommandOutput::text(self.history.render())
    }

    fn builtin_alias(&mut self, args: &[String]) -> Result<CommandOutput, ShellError> {
        if args.is_empty() {
            let listing: String = self
                .aliases
                .iter()
                .map(|(name, value)| format!("alias {}='{}'\n", name, value))
                .collect();
            return Ok(CommandOutput::text(listing));
        }

        // The parser split the value on whitespace; put it back together
        let joined = args.join(" ");
        if let Some((name, value)) = joined.split_once('=') {
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ShellError::Usage("alias: usage: alias [name[=value]]"));
            }
            self.aliases.define(name, strip_quotes(value.trim()));
            return Ok(CommandOutput::default());
        }

        let mut shown = String::new();
        for name in args {
            let value = self
                .aliases
                .get(name)
                .ok_or_else(|| ShellError::AliasNotFound(name.clone()))?;
            shown.push_str(&format!("alias {}='{}'\n", name, value));
        }
        Ok(CommandOutput::text(shown))
    }

    fn builtin_export(&mut self, args: &[String]) -> Result<CommandOutput, ShellError> {
        if args.is_empty() {
            let listing: String = self
                .env
                .iter()
                .map(|(key, value)| format!("{}={}\n", key, value))
                .collect();
            return Ok(CommandOutput::text(listing));
        }

        let mut shown = String::new();
        for arg in args {
            match arg.split_once('=') {
                Some(("", _)) => {
                    return Err(ShellError::Usage("export: usage: export [NAME=value ...]"))
                }
                Some((key, value)) => {
                    self.env.insert(key.to_string(), value.to_string());
                }
                None => {
                    if let Some(value) = self.env.get(arg) {
                        shown.push_str(&format!("{}={}\n", arg, value));
                    }
                }
            }
        }
        Ok(CommandOutput::text(shown))
    }
}

fn io_reason(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::NotFound => "No such file or directory".to_string(),
        io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        _ => e.to_string(),
    }
}

/// Drop one matching pair of surrounding quotes
fn strip_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn shell_in(dir: &Path) -> Shell {
        Shell::default().with_cwd(dir)
    }

    fn run(shell: &mut Shell, line: &str) -> Result<CommandOutput, ShellError> {
        match shell.execute_line(line)? {
            Flow::Continue(output) => Ok(output),
            Flow::Exit => panic!("unexpected exit"),
        }
    }

    #[test]
    fn names_round_trip() {
        for builtin in Builtin::ALL {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(Builtin::from_name("ls"), None);
    }

    #[test]
    fn cd_changes_shell_directory_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let before = std::env::current_dir().unwrap();

        let mut shell = shell_in(dir.path());
        run(&mut shell, "cd sub").unwrap();
        let expected = dir.path().join("sub").canonicalize().unwrap();
        assert_eq!(shell.cwd(), expected);
        assert_eq!(shell.env_var("PWD"), Some(expected.to_str().unwrap()));
        assert_eq!(std::env::current_dir().unwrap(), before);

        let out = run(&mut shell, "pwd").unwrap();
        assert_eq!(out.stdout_text(), format!("{}\n", expected.display()));
    }

    #[test]
    fn cd_without_argument_goes_home() {
        let home = tempfile::tempdir().unwrap();
        let mut shell = Shell::default();
        shell.home = home.path().to_path_buf();
        run(&mut shell, "cd").unwrap();
        assert_eq!(shell.cwd(), home.path().canonicalize().unwrap());
    }

    #[test]
    fn cd_to_missing_directory_keeps_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell_in(dir.path());
        let err = run(&mut shell, "cd nope").unwrap_err();
        assert_eq!(err.to_string(), "cd: nope: No such file or directory");
        assert_eq!(shell.cwd(), dir.path());
        assert_eq!(shell.last_exit_code(), 1);
    }

    #[test]
    fn cd_to_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f"), "").unwrap();
        let mut shell = shell_in(dir.path());
        let err = run(&mut shell, "cd f").unwrap_err();
        assert_eq!(err.to_string(), "cd: f: Not a directory");
    }

    #[test]
    fn external_commands_run_in_shell_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("inner")).unwrap();
        std::fs::write(dir.path().join("inner").join("marker"), "").unwrap();
        let mut shell = shell_in(dir.path());
        run(&mut shell, "cd inner").unwrap();
        assert_eq!(run(&mut shell, "ls").unwrap().stdout_text(), "marker\n");
    }

    #[test]
    fn alias_lists_defaults_sorted() {
        let mut shell = Shell::default();
        let out = run(&mut shell, "alias").unwrap();
        assert_eq!(
            out.stdout_text(),
            "alias l='ls -CF'\nalias la='ls -a'\nalias ll='ls -la'\n"
        );
    }

    #[test]
    fn alias_defines_quoted_value_with_spaces() {
        let mut shell = Shell::default();
        run(&mut shell, "alias greet='echo hello there'").unwrap();
        assert_eq!(shell.aliases().get("greet"), Some("echo hello there"));
        assert_eq!(run(&mut shell, "greet").unwrap().stdout_text(), "hello there\n");
        assert_eq!(
            run(&mut shell, "alias greet").unwrap().stdout_text(),
            "alias greet='echo hello there'\n"
        );
    }

    #[test]
    fn alias_show_unknown_is_an_error() {
        let mut shell = Shell::default();
        let err = run(&mut shell, "alias nope").unwrap_err();
        assert_eq!(err.to_string(), "alias: nope: not found");
    }

    #[test]
    fn alias_with_empty_name_is_rejected() {
        let mut shell = Shell::default();
        assert!(matches!(
            run(&mut shell, "alias =x"),
            Err(ShellError::Usage(_))
        ));
    }

    #[test]
    fn export_sets_env_for_children() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell_in(dir.path());
        run(&mut shell, "export JOBSH_TEST_VALUE=42").unwrap();
        assert!(std::env::var("JOBSH_TEST_VALUE").is_err());
        assert_eq!(
            run(&mut shell, "export JOBSH_TEST_VALUE").unwrap().stdout_text(),
            "JOBSH_TEST_VALUE=42\n"
        );
        let out = run(&mut shell, "printenv JOBSH_TEST_VALUE").unwrap();
        assert_eq!(out.stdout_text(), "42\n");
    }

    #[test]
    fn export_without_arguments_lists_sorted() {
        let mut shell = Shell::default();
        shell.env.clear();
        shell.env.insert("B".into(), "2".into());
        shell.env.insert("A".into(), "1".into());
        assert_eq!(run(&mut shell, "export").unwrap().stdout_text(), "A=1\nB=2\n");
    }

    #[test]
    fn history_is_numbered() {
        let mut shell = Shell::default();
        shell.record_history("echo a");
        shell.record_history("history");
        assert_eq!(
            run(&mut shell, "history").unwrap().stdout_text(),
            "   1  echo a\n   2  history\n"
        );
    }

    #[test]
    fn builtins_ignore_redirect_and_background() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell_in(dir.path());
        let out = run(&mut shell, "pwd > where.txt &").unwrap();
        assert_eq!(out.stdout_text(), format!("{}\n", dir.path().display()));
        assert!(!dir.path().join("where.txt").exists());
        assert!(shell.jobs().is_empty());
    }

    #[test]
    fn strip_quotes_removes_one_matching_pair() {
        assert_eq!(strip_quotes("'a b'"), "a b");
        assert_eq!(strip_quotes("\"a\""), "a");
        assert_eq!(strip_quotes("'a\""), "'a\"");
        assert_eq!(strip_quotes("plain"), "plain");
    }
}
