//! Prompt rendering: `user@host:cwd$ `

use crate::shell::Shell;
use std::path::Path;

/// Build the prompt for the next line
pub fn render(shell: &Shell) -> String {
    let user = shell.env_var("USER").unwrap_or("user");
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string());
    format!(
        "{}@{}:{}$ ",
        user,
        host,
        display_path(shell.cwd(), shell.home())
    )
}

/// `cwd` with a leading `home` shown as `~`
pub fn display_path(cwd: &Path, home: &Path) -> String {
    // A root home would turn every path into ~/...
    if home.parent().is_none() {
        return cwd.display().to_string();
    }
    match cwd.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => cwd.display().to_string(),
    }
}
