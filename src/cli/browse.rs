use super::{CliError, TerminalView};
use crate::catalog::CatalogClient;
use crate::config::load_or_default;
use crate::pagination::{LogViewer, NavigationParams};
use crate::query::{QueryController, QueryEvent, ViewAdapter};
use crate::stream::{EventSourceManager, HttpTransport};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, Default)]
pub struct BrowseOptions {
    pub server: Option<String>,
    pub logfile: Option<String>,
    /// Start the first page strictly before this time, in microseconds
    pub until: Option<i64>,
    /// Print this many pages and exit instead of reading commands
    pub pages: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Older,
    Newer,
    Reload,
    Help,
    Quit,
}

impl NavCommand {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "o" | "older" | "" => Some(NavCommand::Older),
            "n" | "newer" => Some(NavCommand::Newer),
            "r" | "reload" => Some(NavCommand::Reload),
            "h" | "help" | "?" => Some(NavCommand::Help),
            "q" | "quit" | "exit" => Some(NavCommand::Quit),
            _ => None,
        }
    }
}

pub async fn browse(config_path: Option<&Path>, options: BrowseOptions) -> Result<(), CliError> {
    let mut config = load_or_default(config_path)?;
    if let Some(server_url) = options.server {
        config.client.server_url = server_url;
    }

    let logfile = options
        .logfile
        .or_else(|| config.client.logfile.clone())
        .ok_or(CliError::NoLogfile)?;

    let definitions = CatalogClient::new(&config.client)?.list_logfiles().await?;
    let Some(definition) = definitions.iter().find(|d| d.name == logfile) else {
        return Err(CliError::UnknownLogfile {
            name: logfile,
            available: definitions
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        });
    };

    let transport = Arc::new(HttpTransport::new(&config.client)?);
    let manager = EventSourceManager::new(transport).with_idle_timeout(config.client.idle_timeout);
    let view = TerminalView::stdout().with_columns(definition.columns.clone());
    let mut viewer = LogViewer::new(QueryController::new(manager, view, config.client.limit));

    let mut params = NavigationParams::new(logfile);
    if let Some(until) = options.until {
        params = params.until(until);
    }
    viewer.load(&params)?;

    let result = match options.pages {
        Some(pages) => print_pages(&mut viewer, pages).await,
        None => interactive(&mut viewer).await,
    };

    viewer.unload();
    result
}

/// Walk `pages` pages toward older rows, stopping early at the start of the file
pub async fn print_pages<V: ViewAdapter>(
    viewer: &mut LogViewer<V>,
    pages: usize,
) -> Result<(), CliError> {
    for page in 0..pages {
        match viewer.run_page().await {
            Some(QueryEvent::Finished(progress)) if progress.last_row_time.is_some() => {}
            Some(QueryEvent::Failed(_, failure)) => return Err(CliError::Scan(failure)),
            _ => break,
        }

        if page + 1 < pages {
            viewer.older()?;
        }
    }
    Ok(())
}

async fn interactive<V: ViewAdapter>(viewer: &mut LogViewer<V>) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let scanning = viewer.controller().is_active();
        tokio::select! {
            event = viewer.next_event(), if scanning => {
                if matches!(event, Some(ref e) if e.is_terminal()) || event.is_none() {
                    prompt(viewer);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match NavCommand::parse(&line) {
                    Some(NavCommand::Older) => viewer.older()?,
                    Some(NavCommand::Newer) => {
                        if !viewer.newer()? {
                            eprintln!("{}", style("already at the newest page").yellow());
                            prompt(viewer);
                        }
                    }
                    Some(NavCommand::Reload) => viewer.reload()?,
                    Some(NavCommand::Help) => print_help(),
                    Some(NavCommand::Quit) => return Ok(()),
                    None => {
                        eprintln!("{}", style(format!("unknown command '{}'", line.trim())).red());
                        print_help();
                    }
                }
            }
        }
    }
}

fn prompt<V: ViewAdapter>(viewer: &LogViewer<V>) {
    let newer = if viewer.can_go_newer() {
        style("[n]ewer").bold()
    } else {
        style("[n]ewer").dim()
    };
    eprintln!("{}  {}  [r]eload  [q]uit", style("[o]lder").bold(), newer);
}

fn print_help() {
    eprintln!("o, older   scan the page before the oldest row shown");
    eprintln!("n, newer   go back one page");
    eprintln!("r, reload  scan the current page again");
    eprintln!("q, quit    exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(NavCommand::parse("o"), Some(NavCommand::Older));
        assert_eq!(NavCommand::parse(""), Some(NavCommand::Older));
        assert_eq!(NavCommand::parse("  Newer \n"), Some(NavCommand::Newer));
        assert_eq!(NavCommand::parse("r"), Some(NavCommand::Reload));
        assert_eq!(NavCommand::parse("?"), Some(NavCommand::Help));
        assert_eq!(NavCommand::parse("q"), Some(NavCommand::Quit));
        assert_eq!(NavCommand::parse("older please"), None);
    }
}
